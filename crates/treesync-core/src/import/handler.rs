//! Kind-erased handler surface
//!
//! The import controller and the engine work with every entity kind through
//! [`KindHandler`]. [`SerializerHandler`] adapts any [`SyncSerializer`] to it
//! and keeps the entities materialized by pass 1, keyed by the document's
//! position in the batch, until pass 2 is done.

use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::attempt::{ChangeRecord, SyncAttempt};
use crate::document::{Document, SyncAction};
use crate::errors::{Result, SyncError};
use crate::model::{EntityId, EntityKind, SyncEntity};
use crate::serializer::{apply_delete, BatchItems, SerializerOptions, StagedAliases, SyncSerializer};
use crate::tracker::ChangeTracker;

/// What reports carry about an entity once its kind is erased
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub kind: EntityKind,
    pub key: Uuid,
    pub alias: String,
    pub id: Option<EntityId>,
}

impl EntitySummary {
    pub fn of<T: SyncEntity>(item: &T) -> Self {
        Self {
            kind: T::KIND,
            key: item.key(),
            alias: item.alias().to_string(),
            id: item.id(),
        }
    }

    fn of_document(doc: &Document) -> Self {
        Self {
            kind: doc.kind,
            key: doc.key(),
            alias: doc.alias().to_string(),
            id: None,
        }
    }
}

/// One entity kind as seen by orchestration code
pub trait KindHandler {
    fn kind(&self) -> EntityKind;

    /// Serialize every live entity of the kind
    fn export_all(&self) -> Result<Vec<SyncAttempt<Document>>>;

    /// Serialize one entity; `None` when it does not exist
    fn export_one(&self, key: Uuid) -> Result<Option<SyncAttempt<Document>>>;

    /// Pass 1 for the document at `slot`; delete markers are applied here
    ///
    /// `staged` holds what earlier kinds of the batch accepted in pass 1.
    fn first_pass(
        &mut self,
        slot: usize,
        doc: &Document,
        options: &SerializerOptions,
        staged: &StagedAliases,
    ) -> SyncAttempt<EntitySummary>;

    /// Persist the entity pass 1 produced for `slot`
    fn save_pending(&mut self, slot: usize) -> Result<EntitySummary>;

    /// Pass 2 for `slot`; `None` when the kind has no second pass or pass 1
    /// left nothing to work on
    fn second_pass(
        &mut self,
        slot: usize,
        doc: &Document,
        options: &SerializerOptions,
    ) -> Option<SyncAttempt<EntitySummary>>;

    fn get_changes(&self, doc: &Document) -> Vec<ChangeRecord>;

    /// Drop every pending pass-1 entity
    fn reset(&mut self);
}

/// [`KindHandler`] over one serializer
pub struct SerializerHandler<Z: SyncSerializer> {
    serializer: Z,
    pending: BTreeMap<usize, Z::Item>,
}

impl<Z: SyncSerializer> SerializerHandler<Z> {
    pub fn new(serializer: Z) -> Self {
        Self {
            serializer,
            pending: BTreeMap::new(),
        }
    }

    pub fn serializer(&self) -> &Z {
        &self.serializer
    }
}

impl<Z: SyncSerializer> KindHandler for SerializerHandler<Z> {
    fn kind(&self) -> EntityKind {
        self.serializer.kind()
    }

    fn export_all(&self) -> Result<Vec<SyncAttempt<Document>>> {
        let items = self.serializer.items()?;
        Ok(items.iter().map(|item| self.serializer.serialize(item)).collect())
    }

    fn export_one(&self, key: Uuid) -> Result<Option<SyncAttempt<Document>>> {
        let item = self.serializer.find(key)?;
        Ok(item.map(|item| self.serializer.serialize(&item)))
    }

    fn first_pass(
        &mut self,
        slot: usize,
        doc: &Document,
        options: &SerializerOptions,
        staged: &StagedAliases,
    ) -> SyncAttempt<EntitySummary> {
        self.pending.remove(&slot);
        if doc.action == SyncAction::Delete {
            return apply_delete(&self.serializer, doc, options).map(|deleted| {
                deleted
                    .as_ref()
                    .map(EntitySummary::of)
                    .unwrap_or_else(|| EntitySummary::of_document(doc))
            });
        }

        match self.serializer.deserialize_in_batch(doc, options, staged) {
            SyncAttempt::Success {
                name,
                item,
                change_type,
                changes,
            } => {
                let summary = EntitySummary::of(&item);
                self.pending.insert(slot, item);
                SyncAttempt::succeed(name, summary, change_type, changes)
            }
            failed => failed.map(|item| EntitySummary::of(&item)),
        }
    }

    fn save_pending(&mut self, slot: usize) -> Result<EntitySummary> {
        let item = self.pending.get_mut(&slot).ok_or_else(|| SyncError::Internal {
            message: format!("no pending {} entity for batch slot {}", self.serializer.kind(), slot),
        })?;
        self.serializer.save(item)?;
        Ok(EntitySummary::of(item))
    }

    fn second_pass(
        &mut self,
        slot: usize,
        doc: &Document,
        options: &SerializerOptions,
    ) -> Option<SyncAttempt<EntitySummary>> {
        let second_pass = self.serializer.as_second_pass()?;
        let item = self.pending.remove(&slot)?;
        let attempt = {
            let batch = BatchItems::new(self.pending.values());
            second_pass.deserialize_second_pass(item, doc, options, &batch)
        };

        match attempt {
            SyncAttempt::Success {
                name,
                item,
                change_type,
                changes,
            } => {
                let summary = EntitySummary::of(&item);
                self.pending.insert(slot, item);
                Some(SyncAttempt::succeed(name, summary, change_type, changes))
            }
            failed => Some(failed.map(|item| EntitySummary::of(&item))),
        }
    }

    fn get_changes(&self, doc: &Document) -> Vec<ChangeRecord> {
        ChangeTracker::new(&self.serializer).get_changes(doc, &SerializerOptions::report())
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}
