use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{ContentType, EntityId, EntityKind, SyncEntity};

/// Property aliases starting with this prefix are the built-in member fields
/// every member type carries.
pub const BUILTIN_MEMBER_PREFIX: &str = "umbracoMember";

/// A member schema: a content type plus per-property member access flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberType {
    pub base: ContentType,
    /// Access flags keyed by property alias
    pub member_access: BTreeMap<String, MemberAccess>,
}

/// Member-facing flags of one property
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAccess {
    pub can_edit: bool,
    pub can_view: bool,
    pub is_sensitive: bool,
}

impl MemberType {
    pub fn new(key: Uuid, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base: ContentType::new(key, alias, name),
            member_access: BTreeMap::new(),
        }
    }

    /// Flags for a property; properties without an entry get the defaults
    pub fn access(&self, alias: &str) -> MemberAccess {
        self.member_access.get(alias).copied().unwrap_or_default()
    }
}

pub fn is_builtin_member_property(alias: &str) -> bool {
    alias.starts_with(BUILTIN_MEMBER_PREFIX)
}

impl SyncEntity for MemberType {
    const KIND: EntityKind = EntityKind::MemberType;

    fn id(&self) -> Option<EntityId> {
        self.base.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.base.id = Some(id);
    }

    fn key(&self) -> Uuid {
        self.base.key
    }

    fn alias(&self) -> &str {
        &self.base.alias
    }

    fn name(&self) -> &str {
        &self.base.name
    }
}
