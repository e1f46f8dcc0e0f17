//! Change notifications from the live store
//!
//! Whoever hosts the store calls these after an entity was saved or deleted
//! outside of an import, so the on-disk documents can follow.

use uuid::Uuid;

use crate::errors::ExError;
use crate::model::EntityKind;

pub trait EntityChangeListener {
    /// The entity was created or updated
    fn on_entity_changed(&mut self, kind: EntityKind, key: Uuid) -> Result<(), ExError>;

    /// The entity was removed; `alias` is its last known alias
    fn on_entity_deleted(&mut self, kind: EntityKind, key: Uuid, alias: &str) -> Result<(), ExError>;
}
