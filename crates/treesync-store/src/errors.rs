//! Error handling for treesync-store
//!
//! Wraps treesync-core ExError with file-layer helpers

use std::path::Path;

use treesync_core::errors::{ExError, ExErrorKind, SyncError};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create an IO error naming the file it happened on
pub fn io_error_at(operation: &str, path: &Path, err: std::io::Error) -> ExError {
    io_error(operation, err).with_entity_id(path.display().to_string())
}

/// Create a settings validation error
pub fn settings_error(reason: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("load_settings")
        .with_message(reason.to_string())
}

/// A document file could not be decoded
///
/// Keeps the classification of the underlying error (invalid document versus
/// malformed JSON) and records the file as the entity.
pub fn document_parse_error(path: &Path, err: SyncError) -> ExError {
    let source: ExError = err.into();
    ExError::new(source.kind())
        .with_op("read_document")
        .with_entity_id(path.display().to_string())
        .with_message(source.message().to_string())
        .with_source(source)
}

/// A document could not be encoded for writing
pub fn document_encode_error(path: &Path, err: SyncError) -> ExError {
    let source: ExError = err.into();
    ExError::new(ExErrorKind::Serialization)
        .with_op("write_document")
        .with_entity_id(path.display().to_string())
        .with_message(source.message().to_string())
        .with_source(source)
}
