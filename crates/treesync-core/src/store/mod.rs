//! Store collaborator interfaces
//!
//! The live store owns entity lifetime. Serializers only reach it through
//! these traits, and every method takes `&self` so one store handle can be
//! shared by the serializers of every kind for the length of a batch.
//! Implementations are expected to serialize writes themselves.

pub mod memory;

use uuid::Uuid;

use crate::errors::Result;
use crate::model::{
    Container, ContainerRef, ContentItem, ContentType, EntityId, EntityKind, MemberType, SyncEntity, Template,
};

pub use memory::MemoryStore;

/// Per-kind entity access
pub trait EntityStore<T: SyncEntity> {
    fn get_by_key(&self, key: Uuid) -> Result<Option<T>>;

    /// Case-insensitive alias lookup
    fn get_by_alias(&self, alias: &str) -> Result<Option<T>>;

    fn get_by_id(&self, id: EntityId) -> Result<Option<T>>;

    /// All entities of the kind, ordered by id
    fn list(&self) -> Result<Vec<T>>;

    /// Persist the entity, assigning an id when it is new
    fn save(&self, item: &mut T) -> Result<()>;

    fn save_batch(&self, items: &mut [T]) -> Result<()> {
        items.iter_mut().try_for_each(|item| self.save(item))
    }

    fn delete(&self, item: &T) -> Result<()>;
}

/// Tree operations of the content store
pub trait ContentTree: EntityStore<ContentItem> {
    /// Direct children of `parent` (roots for `None`), ordered by sort order
    fn children(&self, parent: Option<Uuid>) -> Result<Vec<ContentItem>>;

    /// Re-parent and persist the item in one call
    fn move_to(&self, item: &mut ContentItem, parent: Option<Uuid>) -> Result<()>;
}

/// Folder operations for kinds that live in containers
pub trait ContainerStore {
    fn get_container(&self, kind: EntityKind, container: ContainerRef) -> Result<Option<Container>>;

    /// Find or create every segment of a `/` separated folder path, returning
    /// the innermost container
    fn ensure_container(&self, kind: EntityKind, path: &str) -> Result<Container>;

    fn delete_container(&self, id: EntityId) -> Result<()>;

    /// Containers of the kind with neither child containers nor entities
    fn empty_containers(&self, kind: EntityKind) -> Result<Vec<Container>>;
}

/// Access to the files backing templates
pub trait ViewResolver {
    /// `None` when the view file does not exist
    fn read_view(&self, alias: &str) -> Result<Option<String>>;
}

/// Everything the built-in serializers need from one shared store handle
pub trait SiteStore:
    EntityStore<Template>
    + EntityStore<ContentType>
    + EntityStore<MemberType>
    + EntityStore<ContentItem>
    + ContentTree
    + ContainerStore
    + ViewResolver
    + Clone
    + 'static
{
}

impl<S> SiteStore for S where
    S: EntityStore<Template>
        + EntityStore<ContentType>
        + EntityStore<MemberType>
        + EntityStore<ContentItem>
        + ContentTree
        + ContainerStore
        + ViewResolver
        + Clone
        + 'static
{
}
