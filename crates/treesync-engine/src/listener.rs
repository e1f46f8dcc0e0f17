//! Keeping the document folder in step with store edits
//!
//! The host application calls [`FolderSync`] from its save and delete hooks.
//! Changes are re-exported one entity at a time through the same naming and
//! export rules as a full export.

use uuid::Uuid;

use treesync_core::errors::ExError;
use treesync_core::events::EntityChangeListener;
use treesync_core::policy::USE_GUID_FILENAMES;
use treesync_core::{EntityKind, HandlerRegistry, SyncAttempt};
use treesync_store::DocumentFolder;

use crate::commands::export::{export_failure, write_document};
use crate::naming::FileNamer;

pub struct FolderSync<'a> {
    registry: &'a HandlerRegistry,
    folder: &'a DocumentFolder,
}

impl<'a> FolderSync<'a> {
    pub fn new(registry: &'a HandlerRegistry, folder: &'a DocumentFolder) -> Self {
        Self { registry, folder }
    }
}

impl EntityChangeListener for FolderSync<'_> {
    fn on_entity_changed(&mut self, kind: EntityKind, key: Uuid) -> Result<(), ExError> {
        let (Some(handler), Some(settings)) = (self.registry.handler(kind), self.registry.settings(kind)) else {
            tracing::debug!(kind = %kind, "no handler for changed entity");
            return Ok(());
        };

        let doc = match handler.export_one(key)? {
            None => {
                tracing::debug!(kind = %kind, key = %key, "changed entity no longer exists");
                return Ok(());
            }
            Some(SyncAttempt::Success { item, .. }) => item,
            Some(failed) => return Err(export_failure(kind, key, &failed)),
        };

        let mut namer = FileNamer::new(settings.get_bool(USE_GUID_FILENAMES, false), self.folder.scan(kind)?);
        let item = write_document(kind, &doc, settings, self.folder, &mut namer)?;
        tracing::debug!(kind = %kind, alias = %item.alias, outcome = ?item.outcome, "entity re-exported");
        Ok(())
    }

    fn on_entity_deleted(&mut self, kind: EntityKind, key: Uuid, alias: &str) -> Result<(), ExError> {
        match self.folder.find_by_key(kind, key)? {
            Some(stored) => {
                self.folder.remove(kind, &stored.stem)?;
                tracing::debug!(kind = %kind, alias, file = %stored.stem, "document removed");
            }
            None => tracing::debug!(kind = %kind, alias, "no document for deleted entity"),
        }
        Ok(())
    }
}
