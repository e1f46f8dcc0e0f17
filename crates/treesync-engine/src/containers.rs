//! Removal of containers an import left empty

use std::collections::BTreeSet;

use treesync_core::model::Container;
use treesync_core::store::ContainerStore;
use treesync_core::EntityKind;
use treesync_store::errors::Result;

/// Delete every container of `kind` with no child containers and no
/// entities, repeating until removing children empties no further parents
///
/// Returns the removed containers, innermost first.
///
/// # Errors
///
/// Propagates store failures as `StoreFailure`.
pub fn clean_empty_containers<S: ContainerStore>(store: &S, kind: EntityKind) -> Result<Vec<Container>> {
    let mut removed = Vec::new();
    let mut removed_ids = BTreeSet::new();

    loop {
        let empty: Vec<Container> = store
            .empty_containers(kind)?
            .into_iter()
            .filter(|c| !removed_ids.contains(&c.id))
            .collect();
        if empty.is_empty() {
            break;
        }
        for container in empty {
            store.delete_container(container.id)?;
            tracing::debug!(kind = %kind, container = %container.name, "removed empty container");
            removed_ids.insert(container.id);
            removed.push(container);
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use treesync_core::model::ContentType;
    use treesync_core::store::{EntityStore, MemoryStore};
    use uuid::Uuid;

    #[test]
    fn test_nested_empty_containers_go_innermost_first() {
        let store = MemoryStore::new();
        store.ensure_container(EntityKind::ContentType, "Old/Blocks").unwrap();
        let mut kept = ContentType::new(Uuid::new_v4(), "page", "Page");
        kept.folder = Some("Pages".to_string());
        store.ensure_container(EntityKind::ContentType, "Pages").unwrap();
        store.save(&mut kept).unwrap();

        let removed = clean_empty_containers(&store, EntityKind::ContentType).unwrap();

        let names: Vec<&str> = removed.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Blocks", "Old"]);
        assert_eq!(store.containers(EntityKind::ContentType).len(), 1);
    }
}
