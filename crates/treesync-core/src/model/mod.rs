//! Live entity model
//!
//! These are the shapes the store hands out. The core clones them for the
//! length of one operation and hands them back through the store traits.

pub mod container;
pub mod content;
pub mod content_type;
pub mod kind;
pub mod member_type;
pub mod template;

use std::fmt;
use uuid::Uuid;

pub use container::{Container, ContainerRef};
pub use content::ContentItem;
pub use content_type::{ContentType, PropertyGroup, PropertyType};
pub use kind::EntityKind;
pub use member_type::{is_builtin_member_property, MemberAccess, MemberType};
pub use template::Template;

/// Store-assigned numeric id
pub type EntityId = i64;

/// Identity surface shared by every live entity kind
pub trait SyncEntity: Clone + fmt::Debug {
    const KIND: EntityKind;

    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: EntityId);
    fn key(&self) -> Uuid;
    /// Human-meaningful lookup name; unique within the kind except for content
    fn alias(&self) -> &str;
    fn name(&self) -> &str;

    /// True until the store has assigned an id
    fn is_new(&self) -> bool {
        self.id().is_none()
    }
}
