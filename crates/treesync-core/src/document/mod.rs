//! Canonical document model
//!
//! A [`Document`] is the normalized, order-stable representation of one live
//! entity. It is produced fresh by every export, written or diffed, and then
//! dropped; documents are never cached across calls.
//!
//! ## Layout
//!
//! - `kind` / `action`: which serializer handles the document and whether it
//!   describes the entity or its deletion
//! - `info`: identity and hierarchy position (required)
//! - `properties`: ordered property definitions or values (required)
//! - `compositions`, `structure`, `tabs`: optional kind-specific sections
//!
//! Field order in the JSON output follows struct declaration order, so two
//! serializations of the same canonical document are byte-identical.

pub mod canonical;
pub mod compare;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{EntityKind, MemberAccess};

pub use canonical::{document_digest, from_json, normalized_text, normalized_value, to_canonical_json};
pub use compare::compare_documents;

/// What importing the document should do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Create or update the entity to match the document
    #[default]
    Update,
    /// Remove the entity with the document's key
    Delete,
}

impl SyncAction {
    fn is_update(&self) -> bool {
        *self == SyncAction::Update
    }
}

/// Canonical document for one entity instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "SyncAction::is_update")]
    pub action: SyncAction,
    pub info: Info,
    pub properties: Vec<PropertyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compositions: Vec<DocRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structure: Vec<DocRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tabs: Vec<Tab>,
}

/// Identity and hierarchy section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    #[serde(default)]
    pub level: u32,
    /// Hierarchical reference: the master of a template, the parent of a
    /// content item, the type a content type extends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<DocRef>,
    /// Container path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Ancestor chain, e.g. `/Home/About`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// Reference to another document by alias, and by key when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Uuid>,
}

impl DocRef {
    pub fn new(alias: impl Into<String>, key: Option<Uuid>) -> Self {
        Self {
            alias: alias.into(),
            key,
        }
    }
}

/// One entry of the properties section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyEntry {
    /// A property definition on a schema type
    Definition(PropertyDefinition),
    /// A property value on a content item
    Value(PropertyValue),
}

impl PropertyEntry {
    pub fn alias(&self) -> &str {
        match self {
            PropertyEntry::Definition(d) => &d.alias,
            PropertyEntry::Value(v) => &v.alias,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Nil for built-in member properties, whose keys differ per install
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    pub editor: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<DocMemberAccess>,
}

/// Member flags as written in documents
///
/// Missing flags read as not editable, not viewable, sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMemberAccess {
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default = "sensitive_by_default")]
    pub is_sensitive: bool,
}

fn sensitive_by_default() -> bool {
    true
}

impl From<MemberAccess> for DocMemberAccess {
    fn from(access: MemberAccess) -> Self {
        Self {
            can_edit: access.can_edit,
            can_view: access.can_view,
            is_sensitive: access.is_sensitive,
        }
    }
}

impl From<DocMemberAccess> for MemberAccess {
    fn from(access: DocMemberAccess) -> Self {
        Self {
            can_edit: access.can_edit,
            can_view: access.can_view,
            is_sensitive: access.is_sensitive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub alias: String,
    pub value: serde_json::Value,
}

/// A property group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl Document {
    /// An empty document of the given kind
    pub fn new(kind: EntityKind, info: Info) -> Self {
        Self {
            kind,
            action: SyncAction::Update,
            info,
            properties: Vec::new(),
            compositions: Vec::new(),
            structure: Vec::new(),
            tabs: Vec::new(),
        }
    }

    /// A delete marker for the entity with the given identity
    pub fn delete_marker(kind: EntityKind, key: Uuid, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        let mut doc = Self::new(kind, Info::new(key, alias.clone(), alias));
        doc.action = SyncAction::Delete;
        doc
    }

    pub fn key(&self) -> Uuid {
        self.info.key
    }

    pub fn alias(&self) -> &str {
        &self.info.alias
    }

    pub fn definitions(&self) -> impl Iterator<Item = &PropertyDefinition> {
        self.properties.iter().filter_map(|p| match p {
            PropertyEntry::Definition(d) => Some(d),
            PropertyEntry::Value(_) => None,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &PropertyValue> {
        self.properties.iter().filter_map(|p| match p {
            PropertyEntry::Value(v) => Some(v),
            PropertyEntry::Definition(_) => None,
        })
    }

    /// Alias of the hierarchical parent reference, if any
    pub fn parent_alias(&self) -> Option<&str> {
        self.info
            .parent
            .as_ref()
            .map(|p| p.alias.as_str())
            .filter(|a| !a.trim().is_empty())
    }
}

impl Info {
    pub fn new(key: Uuid, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key,
            alias: alias.into(),
            name: name.into(),
            level: 0,
            parent: None,
            folder: None,
            path: None,
            trashed: false,
            icon: None,
            description: None,
            content_type: None,
            template: None,
            sort_order: None,
            published: None,
        }
    }
}
