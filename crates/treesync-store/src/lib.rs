//! treesync store - file layer
//!
//! - **Document folder**: one canonical JSON file per entity, written
//!   atomically and only when its digest changes
//! - **View files**: template views read from disk
//! - **Settings**: YAML configuration of the folder and the handlers

pub mod atomic;
pub mod errors;
pub mod folder;
pub mod naming;
pub mod settings;
pub mod views;

pub use folder::{DocumentFolder, StoredDocument, WrittenFile};
pub use naming::safe_file_name;
pub use settings::{HandlerConfig, SyncSettings};
pub use views::{FsViewResolver, WithViewFolder};
