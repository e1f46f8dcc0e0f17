use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{EntityId, EntityKind, SyncEntity};

/// A node in the content tree
///
/// Content names are only unique among siblings, so the tree position is
/// part of an item's identity when matching by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Option<EntityId>,
    pub key: Uuid,
    pub name: String,
    /// Key of the parent item; `None` for root items
    pub parent_key: Option<Uuid>,
    pub sort_order: i32,
    pub content_type_alias: String,
    pub template_alias: Option<String>,
    /// Soft-deleted (in the recycle bin)
    pub trashed: bool,
    pub published: bool,
    /// Property values keyed by property alias
    pub values: BTreeMap<String, serde_json::Value>,
}

impl ContentItem {
    pub fn new(key: Uuid, name: impl Into<String>, content_type_alias: impl Into<String>) -> Self {
        Self {
            id: None,
            key,
            name: name.into(),
            parent_key: None,
            sort_order: 0,
            content_type_alias: content_type_alias.into(),
            template_alias: None,
            trashed: false,
            published: false,
            values: BTreeMap::new(),
        }
    }
}

impl SyncEntity for ContentItem {
    const KIND: EntityKind = EntityKind::Content;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn key(&self) -> Uuid {
        self.key
    }

    fn alias(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }
}
