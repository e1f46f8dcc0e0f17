//! Command orchestration layer.
//!
//! Each command logs its boundary with `log_op_start!` / `log_op_end!` /
//! `log_op_error!`; lower layers only use `tracing::debug!()`.

pub mod check;
pub mod engine_command;
pub mod export;
pub mod sync;
