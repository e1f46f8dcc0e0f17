//! treesync core
//!
//! Serialization, comparison and two-pass import of tree-organized entities
//! (templates, content types, member types and content items):
//! - Live entity model and the store traits the core reaches it through
//! - Canonical documents with deterministic ordering and digests
//! - Per-kind serializers with a second pass for cross-entity references
//! - Change tracking shared by reports and real imports
//! - Batch import controller with per-handler admission rules

pub mod attempt;
pub mod document;
pub mod errors;
pub mod events;
pub mod import;
pub mod logging_facility;
pub mod model;
pub mod policy;
pub mod serializer;
pub mod store;
pub mod tracker;

#[doc(hidden)]
pub use treesync_core_types as core_types;

// Re-export commonly used types
pub use attempt::{ChangeKind, ChangeRecord, ChangeType, SyncAttempt};
pub use document::{compare_documents, Document, SyncAction};
pub use errors::{ExError, ExErrorKind, Result, SyncError};
pub use import::{BatchReport, BatchState, HandlerRegistry, ImportBatch};
pub use model::{EntityKind, SyncEntity};
pub use policy::HandlerSettings;
pub use serializer::{SerializerOptions, SyncSerializer};
pub use tracker::ChangeTracker;
