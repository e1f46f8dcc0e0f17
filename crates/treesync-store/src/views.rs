//! Template view files on disk
//!
//! [`FsViewResolver`] answers view lookups from a directory of `.cshtml`
//! files. [`WithViewFolder`] puts such a directory in front of any store, so
//! an entity store without its own view access can still back the template
//! serializer.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use treesync_core::errors::{Result as CoreResult, SyncError};
use treesync_core::model::{Container, ContainerRef, ContentItem, EntityId, EntityKind, SyncEntity};
use treesync_core::store::{ContainerStore, ContentTree, EntityStore, ViewResolver};

use crate::naming::safe_file_name;

pub const VIEW_EXTENSION: &str = "cshtml";

/// Reads `<root>/<safe alias>.cshtml`
#[derive(Debug, Clone)]
pub struct FsViewResolver {
    root: PathBuf,
}

impl FsViewResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn view_path(&self, alias: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", safe_file_name(alias), VIEW_EXTENSION))
    }
}

impl ViewResolver for FsViewResolver {
    fn read_view(&self, alias: &str) -> CoreResult<Option<String>> {
        let path = self.view_path(alias);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::store(
                "read_view",
                format!("{}: {}", path.display(), e),
            )),
        }
    }
}

/// A store whose view lookups go to a view folder
#[derive(Debug, Clone)]
pub struct WithViewFolder<S> {
    inner: S,
    views: FsViewResolver,
}

impl<S> WithViewFolder<S> {
    pub fn new(inner: S, views: FsViewResolver) -> Self {
        Self { inner, views }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> ViewResolver for WithViewFolder<S> {
    fn read_view(&self, alias: &str) -> CoreResult<Option<String>> {
        self.views.read_view(alias)
    }
}

impl<T: SyncEntity, S: EntityStore<T>> EntityStore<T> for WithViewFolder<S> {
    fn get_by_key(&self, key: Uuid) -> CoreResult<Option<T>> {
        self.inner.get_by_key(key)
    }

    fn get_by_alias(&self, alias: &str) -> CoreResult<Option<T>> {
        self.inner.get_by_alias(alias)
    }

    fn get_by_id(&self, id: EntityId) -> CoreResult<Option<T>> {
        self.inner.get_by_id(id)
    }

    fn list(&self) -> CoreResult<Vec<T>> {
        self.inner.list()
    }

    fn save(&self, item: &mut T) -> CoreResult<()> {
        self.inner.save(item)
    }

    fn save_batch(&self, items: &mut [T]) -> CoreResult<()> {
        self.inner.save_batch(items)
    }

    fn delete(&self, item: &T) -> CoreResult<()> {
        self.inner.delete(item)
    }
}

impl<S: ContentTree> ContentTree for WithViewFolder<S> {
    fn children(&self, parent: Option<Uuid>) -> CoreResult<Vec<ContentItem>> {
        self.inner.children(parent)
    }

    fn move_to(&self, item: &mut ContentItem, parent: Option<Uuid>) -> CoreResult<()> {
        self.inner.move_to(item, parent)
    }
}

impl<S: ContainerStore> ContainerStore for WithViewFolder<S> {
    fn get_container(&self, kind: EntityKind, container: ContainerRef) -> CoreResult<Option<Container>> {
        self.inner.get_container(kind, container)
    }

    fn ensure_container(&self, kind: EntityKind, path: &str) -> CoreResult<Container> {
        self.inner.ensure_container(kind, path)
    }

    fn delete_container(&self, id: EntityId) -> CoreResult<()> {
        self.inner.delete_container(id)
    }

    fn empty_containers(&self, kind: EntityKind) -> CoreResult<Vec<Container>> {
        self.inner.empty_containers(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_existing_view() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("master.cshtml"), "@RenderBody()").unwrap();
        let views = FsViewResolver::new(dir.path());

        assert_eq!(views.read_view("master").unwrap().as_deref(), Some("@RenderBody()"));
        assert_eq!(views.read_view("ghost").unwrap(), None);
    }
}
