//! Entity serializers
//!
//! One serializer per entity kind converts live entities to canonical
//! documents and applies documents back. Deserialization is split in two
//! passes:
//!
//! - pass 1 ([`SyncSerializer::deserialize`]) matches or creates the entity
//!   and applies everything that does not depend on other entities of the
//!   batch. It never saves; the import controller does.
//! - pass 2 ([`SecondPass::deserialize_second_pass`]) resolves references to
//!   entities that may only exist once the whole batch went through pass 1.
//!   Kinds that need it expose the capability through
//!   [`SyncSerializer::as_second_pass`].
//!
//! With [`SerializerOptions::no_save`] neither pass persists anything while
//! still reporting the same change records. The change tracker relies on
//! this, so reports and imports share a single code path.

pub mod content;
pub mod content_type;
pub mod template;

use std::collections::HashMap;
use uuid::Uuid;

use crate::attempt::{ChangeRecord, ChangeType, SyncAttempt};
use crate::document::{Document, SyncAction};
use crate::errors::{Result, SyncError};
use crate::model::{EntityKind, SyncEntity};
use crate::store::EntityStore;

pub use content::ContentSerializer;
pub use content_type::{ContentTypeSerializer, MemberTypeSerializer, SchemaEntity, SchemaSerializer};
pub use template::TemplateSerializer;

/// Reference chains (template masters, type parents) are walked at most
/// this deep.
pub const MAX_CHAIN_DEPTH: u32 = 20;

/// Flags passed to both deserialization passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Report what would change without persisting anything
    pub no_save: bool,
}

impl SerializerOptions {
    /// Options for a real import
    pub fn apply() -> Self {
        Self { no_save: false }
    }

    /// Options for a dry run
    pub fn report() -> Self {
        Self { no_save: true }
    }
}

/// Per-kind conversion between live entities and canonical documents
pub trait SyncSerializer {
    type Item: SyncEntity;

    fn kind(&self) -> EntityKind {
        <Self::Item as SyncEntity>::KIND
    }

    /// Deterministic, side-effect free
    fn serialize(&self, item: &Self::Item) -> SyncAttempt<Document>;

    /// Pass 1: match or create, then apply locally resolvable fields
    fn deserialize(&self, doc: &Document, options: &SerializerOptions) -> SyncAttempt<Self::Item>;

    /// Pass 1 inside a batch, where entities of earlier kinds may only be
    /// staged and not saved yet
    fn deserialize_in_batch(
        &self,
        doc: &Document,
        options: &SerializerOptions,
        _staged: &StagedAliases,
    ) -> SyncAttempt<Self::Item> {
        self.deserialize(doc, options)
    }

    /// The second-pass capability, for kinds with cross-entity references
    fn as_second_pass(&self) -> Option<&dyn SecondPass<Self::Item>> {
        None
    }

    fn save(&self, item: &mut Self::Item) -> Result<()>;

    fn delete(&self, item: &Self::Item) -> Result<()>;

    fn find(&self, key: Uuid) -> Result<Option<Self::Item>>;

    /// Every live entity of the kind, in deterministic export order
    fn items(&self) -> Result<Vec<Self::Item>>;
}

/// Pass 2 of deserialization
pub trait SecondPass<T> {
    /// Resolve cross-entity references
    ///
    /// References are looked up among the batch's pass-1 entities first,
    /// then in the store. An unresolvable reference is left as it is and
    /// produces no change record. When something changed and the entity is
    /// already persisted, this saves the entity once, unless `no_save` is set.
    fn deserialize_second_pass(
        &self,
        item: T,
        doc: &Document,
        options: &SerializerOptions,
        batch: &BatchItems<'_, T>,
    ) -> SyncAttempt<T>;
}

/// Aliases accepted by pass 1 of the current batch, across kinds
///
/// With `no_save` nothing from pass 1 reaches the store, so a serializer
/// that depends on another kind looks here after the store.
#[derive(Debug, Clone, Default)]
pub struct StagedAliases {
    aliases: HashMap<(EntityKind, String), String>,
}

impl StagedAliases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: EntityKind, alias: &str) {
        self.aliases
            .insert((kind, alias.to_lowercase()), alias.to_string());
    }

    /// The staged spelling of `alias`, matched case-insensitively
    pub fn find(&self, kind: EntityKind, alias: &str) -> Option<&str> {
        self.aliases
            .get(&(kind, alias.to_lowercase()))
            .map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.aliases.clear();
    }
}

/// The entities of one kind materialized by pass 1 of the current batch
pub struct BatchItems<'a, T> {
    items: Vec<&'a T>,
}

impl<'a, T: SyncEntity> BatchItems<'a, T> {
    pub fn new(items: impl IntoIterator<Item = &'a T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&'a T> {
        self.items
            .iter()
            .copied()
            .find(|item| item.alias().eq_ignore_ascii_case(alias))
    }

    pub fn find_by_key(&self, key: Uuid) -> Option<&'a T> {
        self.items.iter().copied().find(|item| item.key() == key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Shared start of every pass 1: canonical form plus validation
///
/// # Errors
///
/// Returns the validation error, or `InvalidDocument` when the document is of
/// another kind.
pub(crate) fn prepare(doc: &Document, kind: EntityKind) -> Result<Document> {
    if doc.kind != kind {
        return Err(SyncError::InvalidDocument {
            alias: doc.info.alias.clone(),
            reason: format!("expected a {} document, got {}", kind, doc.kind),
        });
    }
    let doc = doc.clone().into_canonical();
    doc.validate()?;
    Ok(doc)
}

/// Find by key, then by alias
pub(crate) fn locate<T, S>(store: &S, doc: &Document) -> Result<Option<T>>
where
    T: SyncEntity,
    S: EntityStore<T>,
{
    if let Some(item) = store.get_by_key(doc.key())? {
        return Ok(Some(item));
    }
    store.get_by_alias(doc.alias())
}

/// Resolve an alias against the batch, then the store; returns the key
pub(crate) fn resolve_alias<T, S>(store: &S, batch: &BatchItems<'_, T>, alias: &str) -> Option<(String, Uuid)>
where
    T: SyncEntity,
    S: EntityStore<T>,
{
    if let Some(item) = batch.find_by_alias(alias) {
        return Some((item.alias().to_string(), item.key()));
    }
    match store.get_by_alias(alias) {
        Ok(found) => found.map(|item| (item.alias().to_string(), item.key())),
        Err(err) => {
            tracing::debug!(alias, error = %err, "reference lookup failed, leaving unresolved");
            None
        }
    }
}

/// Number of links in a reference chain, bounded by [`MAX_CHAIN_DEPTH`]
pub(crate) fn chain_depth(start: Option<String>, next: impl Fn(&str) -> Option<String>) -> u32 {
    let mut depth = 0;
    let mut current = start;
    while let Some(alias) = current {
        depth += 1;
        if depth >= MAX_CHAIN_DEPTH {
            break;
        }
        current = next(&alias);
    }
    depth
}

/// Apply a delete-action document
///
/// Succeeds with `NoChange` when there is nothing to delete. The returned
/// item is the entity that was (or would be) deleted.
pub fn apply_delete<S: SyncSerializer>(
    serializer: &S,
    doc: &Document,
    options: &SerializerOptions,
) -> SyncAttempt<Option<S::Item>> {
    debug_assert_eq!(doc.action, SyncAction::Delete);
    let name = doc.alias().to_string();
    let existing = match serializer.find(doc.key()) {
        Ok(existing) => existing,
        Err(err) => return SyncAttempt::fail_with(name, ChangeType::Delete, err),
    };
    let Some(item) = existing else {
        return SyncAttempt::succeed(name, None, ChangeType::NoChange, Vec::new());
    };

    if !options.no_save {
        if let Err(err) = serializer.delete(&item) {
            return SyncAttempt::fail_with(name, ChangeType::Delete, err);
        }
    }
    let change = ChangeRecord::removed("Delete", item.alias(), item.key());
    SyncAttempt::succeed(name, Some(item), ChangeType::Delete, vec![change])
}

/// Case-insensitive comparison of alias lists
pub(crate) fn same_aliases(a: &[String], b: &[String]) -> bool {
    let norm = |list: &[String]| {
        let mut v: Vec<String> = list.iter().map(|s| s.to_lowercase()).collect();
        v.sort();
        v
    };
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_depth_counts_links() {
        let chain = |alias: &str| match alias {
            "c" => Some("b".to_string()),
            "b" => Some("a".to_string()),
            _ => None,
        };
        assert_eq!(chain_depth(None, chain), 0);
        assert_eq!(chain_depth(Some("c".to_string()), chain), 3);
    }

    #[test]
    fn test_chain_depth_is_bounded_on_cycles() {
        let cycle = |alias: &str| Some(alias.to_string());
        assert_eq!(chain_depth(Some("a".to_string()), cycle), MAX_CHAIN_DEPTH);
    }

    #[test]
    fn test_same_aliases_ignores_case_and_order() {
        let a = vec!["Seo".to_string(), "banner".to_string()];
        let b = vec!["Banner".to_string(), "seo".to_string()];
        assert!(same_aliases(&a, &b));
        assert!(!same_aliases(&a, &b[..1]));
    }
}
