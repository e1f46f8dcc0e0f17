use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{ContainerStore, ContentTree, EntityStore, ViewResolver};
use crate::errors::{Result, SyncError};
use crate::model::{
    Container, ContainerRef, ContentItem, ContentType, EntityId, EntityKind, MemberType,
    SyncEntity, Template,
};

/// In-memory store for every entity kind
///
/// A cheap, cloneable handle: clones share the same state, so a test can
/// hand one clone to the serializers and inspect another. Every save is
/// appended to a save log, which is how tests count writes per entity.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

/// One recorded `save` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub kind: EntityKind,
    pub key: Uuid,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    next_id: EntityId,
    content_types: BTreeMap<EntityId, ContentType>,
    member_types: BTreeMap<EntityId, MemberType>,
    templates: BTreeMap<EntityId, Template>,
    content: BTreeMap<EntityId, ContentItem>,
    containers: BTreeMap<EntityId, Container>,
    views: BTreeMap<String, String>,
    save_log: Vec<SaveRecord>,
    rejected_aliases: BTreeSet<String>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }
}

/// Selects the table holding one entity kind
pub trait MemoryTable: SyncEntity {
    fn table(state: &MemoryState) -> &BTreeMap<EntityId, Self>;
    fn table_mut(state: &mut MemoryState) -> &mut BTreeMap<EntityId, Self>;
}

impl MemoryTable for ContentType {
    fn table(state: &MemoryState) -> &BTreeMap<EntityId, Self> {
        &state.content_types
    }
    fn table_mut(state: &mut MemoryState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.content_types
    }
}

impl MemoryTable for MemberType {
    fn table(state: &MemoryState) -> &BTreeMap<EntityId, Self> {
        &state.member_types
    }
    fn table_mut(state: &mut MemoryState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.member_types
    }
}

impl MemoryTable for Template {
    fn table(state: &MemoryState) -> &BTreeMap<EntityId, Self> {
        &state.templates
    }
    fn table_mut(state: &mut MemoryState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.templates
    }
}

impl MemoryTable for ContentItem {
    fn table(state: &MemoryState) -> &BTreeMap<EntityId, Self> {
        &state.content
    }
    fn table_mut(state: &mut MemoryState) -> &mut BTreeMap<EntityId, Self> {
        &mut state.content
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| SyncError::store("lock", "memory store lock poisoned"))
    }

    /// Register a view file for a template alias
    pub fn add_view(&self, alias: &str, content: &str) -> Result<()> {
        self.state()?
            .views
            .insert(alias.to_lowercase(), content.to_string());
        Ok(())
    }

    pub fn remove_view(&self, alias: &str) -> Result<()> {
        self.state()?.views.remove(&alias.to_lowercase());
        Ok(())
    }

    /// Make every later save of an entity with this alias fail
    pub fn reject_saves_for(&self, alias: &str) -> Result<()> {
        self.state()?.rejected_aliases.insert(alias.to_lowercase());
        Ok(())
    }

    pub fn save_log(&self) -> Vec<SaveRecord> {
        self.state().map(|s| s.save_log.clone()).unwrap_or_default()
    }

    /// Number of saves recorded for one entity key
    pub fn save_count(&self, key: Uuid) -> usize {
        self.save_log().iter().filter(|r| r.key == key).count()
    }

    pub fn clear_save_log(&self) -> Result<()> {
        self.state()?.save_log.clear();
        Ok(())
    }

    pub fn containers(&self, kind: EntityKind) -> Vec<Container> {
        self.state()
            .map(|s| {
                s.containers
                    .values()
                    .filter(|c| c.kind == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn container_path(state: &MemoryState, container: &Container) -> String {
        let mut segments = vec![container.name.clone()];
        let mut parent = container.parent_id;
        // Containers are created parent-first, so the chain is finite
        while let Some(id) = parent {
            match state.containers.get(&id) {
                Some(c) => {
                    segments.push(c.name.clone());
                    parent = c.parent_id;
                }
                None => break,
            }
        }
        segments.reverse();
        segments.join("/")
    }
}

impl<T: MemoryTable> EntityStore<T> for MemoryStore {
    fn get_by_key(&self, key: Uuid) -> Result<Option<T>> {
        let state = self.state()?;
        Ok(T::table(&state).values().find(|e| e.key() == key).cloned())
    }

    fn get_by_alias(&self, alias: &str) -> Result<Option<T>> {
        let state = self.state()?;
        Ok(T::table(&state)
            .values()
            .find(|e| e.alias().eq_ignore_ascii_case(alias))
            .cloned())
    }

    fn get_by_id(&self, id: EntityId) -> Result<Option<T>> {
        let state = self.state()?;
        Ok(T::table(&state).get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<T>> {
        let state = self.state()?;
        Ok(T::table(&state).values().cloned().collect())
    }

    fn save(&self, item: &mut T) -> Result<()> {
        let mut state = self.state()?;
        if state
            .rejected_aliases
            .contains(&item.alias().to_lowercase())
        {
            return Err(SyncError::store(
                "save",
                format!("save rejected for '{}'", item.alias()),
            ));
        }
        let clash = T::table(&state)
            .values()
            .any(|e| e.key() == item.key() && e.id() != item.id());
        if clash {
            return Err(SyncError::store(
                "save",
                format!("key {} already belongs to another {}", item.key(), T::KIND),
            ));
        }

        let id = match item.id() {
            Some(id) => id,
            None => {
                let id = state.allocate_id();
                item.set_id(id);
                id
            }
        };
        T::table_mut(&mut state).insert(id, item.clone());
        state.save_log.push(SaveRecord {
            kind: T::KIND,
            key: item.key(),
        });
        Ok(())
    }

    fn delete(&self, item: &T) -> Result<()> {
        let mut state = self.state()?;
        let table = T::table_mut(&mut state);
        let id = item
            .id()
            .or_else(|| table.values().find(|e| e.key() == item.key()).and_then(|e| e.id()));
        match id.and_then(|id| table.remove(&id)) {
            Some(_) => Ok(()),
            None => Err(SyncError::NotFound {
                kind: T::KIND.to_string(),
                id: item.key().to_string(),
            }),
        }
    }
}

impl ContentTree for MemoryStore {
    fn children(&self, parent: Option<Uuid>) -> Result<Vec<ContentItem>> {
        let state = self.state()?;
        let mut children: Vec<ContentItem> = state
            .content
            .values()
            .filter(|c| c.parent_key == parent)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.id.cmp(&b.id)));
        Ok(children)
    }

    fn move_to(&self, item: &mut ContentItem, parent: Option<Uuid>) -> Result<()> {
        item.parent_key = parent;
        self.save(item)
    }
}

impl ContainerStore for MemoryStore {
    fn get_container(&self, kind: EntityKind, container: ContainerRef) -> Result<Option<Container>> {
        let state = self.state()?;
        Ok(state
            .containers
            .values()
            .filter(|c| c.kind == kind)
            .find(|c| match container {
                ContainerRef::Id(id) => c.id == id,
                ContainerRef::Key(key) => c.key == key,
            })
            .cloned())
    }

    fn ensure_container(&self, kind: EntityKind, path: &str) -> Result<Container> {
        let mut state = self.state()?;
        let mut parent: Option<Container> = None;
        for segment in path.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            let parent_id = parent.as_ref().map(|p| p.id);
            let existing = state
                .containers
                .values()
                .find(|c| {
                    c.kind == kind && c.parent_id == parent_id && c.name.eq_ignore_ascii_case(segment)
                })
                .cloned();
            let container = match existing {
                Some(c) => c,
                None => {
                    let container = Container {
                        id: state.allocate_id(),
                        key: Uuid::new_v4(),
                        kind,
                        name: segment.to_string(),
                        parent_id,
                    };
                    state.containers.insert(container.id, container.clone());
                    container
                }
            };
            parent = Some(container);
        }
        parent.ok_or_else(|| SyncError::store("ensure_container", "empty folder path"))
    }

    fn delete_container(&self, id: EntityId) -> Result<()> {
        let mut state = self.state()?;
        state
            .containers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| SyncError::NotFound {
                kind: "container".to_string(),
                id: id.to_string(),
            })
    }

    fn empty_containers(&self, kind: EntityKind) -> Result<Vec<Container>> {
        let state = self.state()?;
        let folders: Vec<String> = match kind {
            EntityKind::ContentType => state
                .content_types
                .values()
                .filter_map(|t| t.folder.clone())
                .collect(),
            EntityKind::MemberType => state
                .member_types
                .values()
                .filter_map(|t| t.base.folder.clone())
                .collect(),
            _ => Vec::new(),
        };

        Ok(state
            .containers
            .values()
            .filter(|c| c.kind == kind)
            .filter(|c| !state.containers.values().any(|o| o.parent_id == Some(c.id)))
            .filter(|c| {
                let path = Self::container_path(&state, c).to_lowercase();
                !folders.iter().any(|f| {
                    let f = f.trim_matches('/').to_lowercase();
                    f == path || f.starts_with(&format!("{}/", path))
                })
            })
            .cloned()
            .collect())
    }
}

impl ViewResolver for MemoryStore {
    fn read_view(&self, alias: &str) -> Result<Option<String>> {
        Ok(self.state()?.views.get(&alias.to_lowercase()).cloned())
    }
}
