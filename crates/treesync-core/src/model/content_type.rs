use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityId, EntityKind, SyncEntity};

/// A document schema: a named set of property definitions grouped in tabs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    /// Store-assigned id; `None` until the first save
    pub id: Option<EntityId>,
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    /// Container path (`/` separated) the type lives in, if any
    pub folder: Option<String>,
    /// Alias of the type this one extends
    pub parent_alias: Option<String>,
    /// Aliases of composed types
    pub compositions: Vec<String>,
    /// Aliases of types allowed as children of this one
    pub allowed_children: Vec<String>,
    pub groups: Vec<PropertyGroup>,
    pub properties: Vec<PropertyType>,
}

/// A tab grouping property definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyGroup {
    pub name: String,
    pub sort_order: i32,
}

/// One property definition on a schema type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    /// Alias of the editor/data type backing the property
    pub editor: String,
    pub mandatory: bool,
    pub validation: Option<String>,
    pub description: Option<String>,
    /// Name of the group the property sits in
    pub group: Option<String>,
    pub sort_order: i32,
}

impl ContentType {
    /// Factory for a fresh, unsaved type
    pub fn new(key: Uuid, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            key,
            alias: alias.into(),
            name: name.into(),
            icon: None,
            description: None,
            folder: None,
            parent_alias: None,
            compositions: Vec::new(),
            allowed_children: Vec::new(),
            groups: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn property(&self, alias: &str) -> Option<&PropertyType> {
        self.properties
            .iter()
            .find(|p| p.alias.eq_ignore_ascii_case(alias))
    }
}

impl PropertyType {
    pub fn new(alias: impl Into<String>, name: impl Into<String>, editor: impl Into<String>) -> Self {
        Self {
            key: Uuid::new_v4(),
            alias: alias.into(),
            name: name.into(),
            editor: editor.into(),
            mandatory: false,
            validation: None,
            description: None,
            group: None,
            sort_order: 0,
        }
    }
}

impl SyncEntity for ContentType {
    const KIND: EntityKind = EntityKind::ContentType;

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
        &self.alias
    }

    fn name(&self) -> &str {
        &self.name
    }
}
