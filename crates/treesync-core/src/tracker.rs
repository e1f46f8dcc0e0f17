//! Change reporting
//!
//! Reports run the normal deserialize passes with saving forced off, so a
//! report lists exactly the records a real import would produce.

use crate::attempt::{ChangeRecord, SyncAttempt};
use crate::document::{Document, SyncAction};
use crate::errors::{Result, SyncError};
use crate::serializer::{apply_delete, BatchItems, SerializerOptions, SyncSerializer};

/// Computes what applying a document would change, without changing it
pub struct ChangeTracker<'a, S> {
    serializer: &'a S,
}

impl<'a, S: SyncSerializer> ChangeTracker<'a, S> {
    pub fn new(serializer: &'a S) -> Self {
        Self { serializer }
    }

    /// Change records of pass 1 followed by those of pass 2
    ///
    /// `no_save` is forced on whatever the caller passes. A failed pass
    /// yields a single `Error` record carrying the failure message.
    pub fn get_changes(&self, doc: &Document, options: &SerializerOptions) -> Vec<ChangeRecord> {
        let mut options = *options;
        options.no_save = true;

        if doc.action == SyncAction::Delete {
            return match apply_delete(self.serializer, doc, &options) {
                attempt @ SyncAttempt::Success { .. } => attempt.changes().to_vec(),
                failed => vec![error_record(&failed)],
            };
        }

        let first = self.serializer.deserialize(doc, &options);
        let mut records = first.changes().to_vec();
        let item = match first {
            SyncAttempt::Success { item, .. } => item,
            failed => return vec![error_record(&failed)],
        };

        if let Some(second_pass) = self.serializer.as_second_pass() {
            let second = second_pass.deserialize_second_pass(item, doc, &options, &BatchItems::empty());
            if !second.is_success() {
                return vec![error_record(&second)];
            }
            records.extend_from_slice(second.changes());
        }
        records
    }

    /// True when applying the document would change nothing
    pub fn is_current(&self, doc: &Document) -> Result<bool> {
        let records = self.get_changes(doc, &SerializerOptions::report());
        if let Some(error) = records.iter().find(|r| r.name == ERROR_RECORD) {
            return Err(SyncError::InvalidDocument {
                alias: doc.alias().to_string(),
                reason: error.new_value.clone().unwrap_or_default(),
            });
        }
        Ok(records.is_empty())
    }
}

/// Name of the record standing in for a failed report
pub const ERROR_RECORD: &str = "Error";

fn error_record<T>(failed: &SyncAttempt<T>) -> ChangeRecord {
    ChangeRecord::no_change(
        ERROR_RECORD,
        failed.name(),
        failed.message().unwrap_or("unknown failure"),
    )
}
