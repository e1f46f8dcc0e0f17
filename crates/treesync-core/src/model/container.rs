use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityId, EntityKind};

/// A folder grouping entities of one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: EntityId,
    pub key: Uuid,
    pub kind: EntityKind,
    pub name: String,
    pub parent_id: Option<EntityId>,
}

/// Address of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRef {
    Id(EntityId),
    Key(Uuid),
}
