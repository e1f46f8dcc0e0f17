//! treesync engine - orchestration layer
//!
//! Ties the core handlers to the document folder: builds the handler
//! registry from settings, runs export, import, report and drift-check
//! commands, and keeps files in step with store changes.

pub mod commands;
pub mod containers;
pub mod listener;
pub mod naming;
pub mod startup;

pub use commands::engine_command::{apply_engine_command, EngineCommand, EngineCommandResult};
pub use listener::FolderSync;
pub use startup::{build_registry, SyncContext};
