//! Core types shared across treesync facilities
//!
//! - **Correlation types**: RequestId, TraceId, RequestContext
//! - **Schema constants**: canonical field keys and event names used by the
//!   logging macros and the batch reports

pub mod correlation;
pub mod schema;

pub use correlation::{RequestContext, RequestId, TraceId};
