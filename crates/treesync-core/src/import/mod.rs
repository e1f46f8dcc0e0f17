//! Import orchestration
//!
//! [`HandlerRegistry`] maps each entity kind to its handler and settings.
//! [`ImportBatch`] runs a set of documents through both deserialize passes
//! and produces a [`BatchReport`].

pub mod batch;
pub mod cancel;
pub mod handler;
pub mod registry;

pub use batch::{BatchReport, BatchState, ImportBatch, ItemOutcome, ItemReport};
pub use cancel::CancelToken;
pub use handler::{EntitySummary, KindHandler, SerializerHandler};
pub use registry::HandlerRegistry;
