//! Structured logging facility for treesync
//!
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! ```rust
//! use treesync_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Batch, export and import boundaries log one start and one end (or
//! end_error) event each. Per-document detail such as filtered or skipped
//! items is logged at debug level.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
