//! Atomic write primitives
//!
//! Uses temp→rename pattern to ensure no partial writes

use crate::errors::{io_error_at, Result};
use std::fs;
use std::path::Path;

/// Atomically write bytes to a file
///
/// The temp file lives next to the target so the rename never crosses a
/// filesystem boundary.
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error_at("create_document_dir", parent, e))?;
    }

    let temp_path = target_path.with_extension("tmp");

    fs::write(&temp_path, content).map_err(|e| io_error_at("write_document_temp", &temp_path, e))?;

    if let Err(e) = fs::rename(&temp_path, target_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error_at("rename_document_temp", target_path, e));
    }

    Ok(())
}
