//! Content item serializer
//!
//! Content items are matched by key, then by name among the siblings under
//! the document's parent. A parent that does not exist yet leaves the item
//! at the root after pass 1; pass 2 moves it once the parent is known.

use serde_json::Value;
use uuid::Uuid;

use super::{prepare, BatchItems, SecondPass, SerializerOptions, StagedAliases, SyncSerializer};
use crate::attempt::{ChangeLog, ChangeRecord, ChangeType, SyncAttempt};
use crate::document::{normalized_text, normalized_value, DocRef, Document, Info, PropertyEntry, PropertyValue};
use crate::errors::{Result, SyncError};
use crate::model::{ContentItem, ContentType, EntityKind, SyncEntity};
use crate::store::{ContentTree, EntityStore};

/// Guard against parent cycles in a corrupt tree
const MAX_TREE_DEPTH: usize = 256;

pub struct ContentSerializer<S> {
    store: S,
}

impl<S> ContentSerializer<S>
where
    S: ContentTree + EntityStore<ContentType>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn get(&self, key: Uuid) -> Result<Option<ContentItem>> {
        EntityStore::<ContentItem>::get_by_key(&self.store, key)
    }

    /// Ancestors from the direct parent up to the root
    fn ancestors(&self, item: &ContentItem) -> Vec<ContentItem> {
        let mut out = Vec::new();
        let mut next = item.parent_key;
        while let Some(key) = next {
            if out.len() >= MAX_TREE_DEPTH || key == item.key {
                break;
            }
            match self.get(key) {
                Ok(Some(parent)) => {
                    next = parent.parent_key;
                    out.push(parent);
                }
                _ => break,
            }
        }
        out
    }

    /// Alias of the document's content type, from the store or staged earlier
    /// in the batch
    fn content_type_for(&self, doc: &Document, staged: &StagedAliases) -> Result<String> {
        let alias = doc
            .info
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| SyncError::MissingField {
                alias: doc.alias().to_string(),
                field: "info.content_type".to_string(),
            })?;
        if let Some(content_type) = EntityStore::<ContentType>::get_by_alias(&self.store, alias)? {
            return Ok(content_type.alias);
        }
        staged
            .find(EntityKind::ContentType, alias)
            .map(str::to_string)
            .ok_or_else(|| SyncError::DependencyMissing {
                alias: doc.alias().to_string(),
                message: format!(
                    "Content type '{}' for '{}' was not found",
                    alias,
                    doc.alias()
                ),
            })
    }

    /// Key of the document's parent when it is already in the store
    fn existing_parent(&self, doc: &Document) -> Result<Option<Uuid>> {
        let Some(key) = doc.info.parent.as_ref().and_then(|p| p.key) else {
            return Ok(None);
        };
        Ok(self.get(key)?.map(|parent| parent.key))
    }

    fn locate(&self, doc: &Document, parent: Option<Uuid>) -> Result<Option<ContentItem>> {
        if let Some(item) = self.get(doc.key())? {
            return Ok(Some(item));
        }
        let siblings = self.store.children(parent)?;
        Ok(siblings
            .into_iter()
            .find(|c| normalized_text(&c.name).eq_ignore_ascii_case(&doc.info.name)))
    }

    fn apply(&self, doc: &Document, item: &mut ContentItem, content_type: &str, changes: &mut ChangeLog) {
        changes.track("Key", "Info/Key", &mut item.key, doc.key());
        changes.track_text("Name", "Info/Name", &mut item.name, doc.info.name.clone());
        changes.track(
            "ContentType",
            "Info/ContentType",
            &mut item.content_type_alias,
            content_type.to_string(),
        );
        changes.track_text_opt("Template", "Info/Template", &mut item.template_alias, doc.info.template.clone());
        if let Some(sort_order) = doc.info.sort_order {
            changes.track("SortOrder", "Info/SortOrder", &mut item.sort_order, sort_order);
        }
        changes.track("Trashed", "Info/Trashed", &mut item.trashed, doc.info.trashed);
        if let Some(published) = doc.info.published {
            changes.track("Published", "Info/Published", &mut item.published, published);
        }
        if doc.info.parent.is_none() {
            changes.track_opt("Parent", "Info/Parent", &mut item.parent_key, None);
        }

        for incoming in doc.values() {
            match item.values.get(&incoming.alias) {
                Some(current) if normalized_value(current) == incoming.value => continue,
                Some(current) => changes.push(ChangeRecord::update(
                    &incoming.alias,
                    &incoming.alias,
                    render(current),
                    render(&incoming.value),
                )),
                None => changes.push(ChangeRecord::added(
                    &incoming.alias,
                    &incoming.alias,
                    render(&incoming.value),
                )),
            }
            item.values
                .insert(incoming.alias.clone(), incoming.value.clone());
        }
        let stale: Vec<String> = item
            .values
            .keys()
            .filter(|alias| !doc.values().any(|v| &v.alias == *alias))
            .cloned()
            .collect();
        for alias in stale {
            if let Some(old) = item.values.remove(&alias) {
                changes.push(ChangeRecord::removed(&alias, &alias, render(&old)));
            }
        }
    }
}

impl<S> SyncSerializer for ContentSerializer<S>
where
    S: ContentTree + EntityStore<ContentType>,
{
    type Item = ContentItem;

    fn serialize(&self, item: &ContentItem) -> SyncAttempt<Document> {
        let ancestors = self.ancestors(item);
        let mut names: Vec<&str> = ancestors.iter().rev().map(|a| a.name.as_str()).collect();
        names.push(&item.name);

        let mut info = Info::new(item.key, item.name.clone(), item.name.clone());
        info.level = names.len() as u32;
        info.path = Some(format!("/{}", names.join("/")));
        info.parent = ancestors
            .first()
            .map(|parent| DocRef::new(parent.name.clone(), Some(parent.key)));
        info.trashed = item.trashed;
        info.content_type = Some(item.content_type_alias.clone());
        info.template = item.template_alias.clone();
        info.sort_order = Some(item.sort_order);
        info.published = Some(item.published);

        let mut doc = Document::new(EntityKind::Content, info);
        doc.properties = item
            .values
            .iter()
            .map(|(alias, value)| {
                PropertyEntry::Value(PropertyValue {
                    alias: alias.clone(),
                    value: value.clone(),
                })
            })
            .collect();

        SyncAttempt::succeed(item.name.clone(), doc.into_canonical(), ChangeType::Export, Vec::new())
    }

    fn deserialize(&self, doc: &Document, options: &SerializerOptions) -> SyncAttempt<ContentItem> {
        self.deserialize_in_batch(doc, options, &StagedAliases::new())
    }

    fn deserialize_in_batch(
        &self,
        doc: &Document,
        _options: &SerializerOptions,
        staged: &StagedAliases,
    ) -> SyncAttempt<ContentItem> {
        let fail = |err: SyncError| SyncAttempt::fail_with(doc.alias(), ChangeType::Import, err);
        let doc = match prepare(doc, EntityKind::Content) {
            Ok(doc) => doc,
            Err(err) => return fail(err),
        };
        let content_type = match self.content_type_for(&doc, staged) {
            Ok(content_type) => content_type,
            Err(err) => return fail(err),
        };
        let located = self
            .existing_parent(&doc)
            .and_then(|parent| Ok((parent, self.locate(&doc, parent)?)));
        let (parent, existing) = match located {
            Ok(found) => found,
            Err(err) => return fail(err),
        };

        let mut changes = ChangeLog::new();
        let mut item = existing.unwrap_or_else(|| {
            changes.push(ChangeRecord::added("New", "Info", doc.alias()));
            let mut item = ContentItem::new(doc.key(), &doc.info.name, &content_type);
            item.parent_key = parent;
            item
        });
        self.apply(&doc, &mut item, &content_type, &mut changes);

        let records = changes.into_records();
        let change_type = ChangeType::from_changes(item.is_new(), &records);
        SyncAttempt::succeed(doc.alias(), item, change_type, records)
    }

    fn as_second_pass(&self) -> Option<&dyn SecondPass<ContentItem>> {
        Some(self)
    }

    fn save(&self, item: &mut ContentItem) -> Result<()> {
        EntityStore::<ContentItem>::save(&self.store, item)
    }

    fn delete(&self, item: &ContentItem) -> Result<()> {
        EntityStore::<ContentItem>::delete(&self.store, item)
    }

    fn find(&self, key: Uuid) -> Result<Option<ContentItem>> {
        self.get(key)
    }

    fn items(&self) -> Result<Vec<ContentItem>> {
        EntityStore::<ContentItem>::list(&self.store)
    }
}

impl<S> SecondPass<ContentItem> for ContentSerializer<S>
where
    S: ContentTree + EntityStore<ContentType>,
{
    fn deserialize_second_pass(
        &self,
        mut item: ContentItem,
        doc: &Document,
        options: &SerializerOptions,
        batch: &BatchItems<'_, ContentItem>,
    ) -> SyncAttempt<ContentItem> {
        let target = doc
            .info
            .parent
            .as_ref()
            .and_then(|p| p.key)
            .filter(|key| *key != item.key)
            .and_then(|key| {
                batch
                    .find_by_key(key)
                    .map(|parent| parent.key)
                    .or_else(|| self.get(key).ok().flatten().map(|parent| parent.key))
            });

        let mut changes = Vec::new();
        if let Some(target) = target.filter(|t| item.parent_key != Some(*t)) {
            let old = item.parent_key.map(|k| k.to_string()).unwrap_or_default();
            changes.push(ChangeRecord::update("Parent", "Info/Parent", old, target));
            if !options.no_save && !item.is_new() {
                if let Err(err) = self.store.move_to(&mut item, Some(target)) {
                    return SyncAttempt::fail_with(item.name.clone(), ChangeType::Update, err);
                }
            } else {
                item.parent_key = Some(target);
            }
        }

        let change_type = if changes.is_empty() {
            ChangeType::NoChange
        } else {
            ChangeType::Update
        };
        SyncAttempt::succeed(item.name.clone(), item, change_type, changes)
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store_with_page_type() -> MemoryStore {
        let store = MemoryStore::new();
        let mut page = ContentType::new(Uuid::new_v4(), "page", "Page");
        EntityStore::<ContentType>::save(&store, &mut page).unwrap();
        store
    }

    fn content_doc(name: &str, parent: Option<Uuid>) -> Document {
        let mut info = Info::new(Uuid::new_v4(), name, name);
        info.content_type = Some("page".into());
        info.parent = parent.map(|key| DocRef::new("parent", Some(key)));
        let mut doc = Document::new(EntityKind::Content, info);
        doc.properties.push(PropertyEntry::Value(PropertyValue {
            alias: "title".into(),
            value: Value::from(name),
        }));
        doc
    }

    #[test]
    fn test_unknown_content_type_fails() {
        let serializer = ContentSerializer::new(MemoryStore::new());

        let attempt = serializer.deserialize(&content_doc("Home", None), &SerializerOptions::apply());

        assert!(!attempt.is_success());
        assert!(attempt.message().unwrap().contains("'page'"));
    }

    #[test]
    fn test_missing_parent_degrades_to_root() {
        let serializer = ContentSerializer::new(store_with_page_type());

        let attempt = serializer.deserialize(
            &content_doc("About", Some(Uuid::new_v4())),
            &SerializerOptions::apply(),
        );

        assert_eq!(attempt.change_type(), ChangeType::Create);
        assert_eq!(attempt.item().unwrap().parent_key, None);
    }

    #[test]
    fn test_export_path_and_level() {
        let store = store_with_page_type();
        let mut home = ContentItem::new(Uuid::new_v4(), "Home", "page");
        EntityStore::<ContentItem>::save(&store, &mut home).unwrap();
        let mut about = ContentItem::new(Uuid::new_v4(), "About", "page");
        about.parent_key = Some(home.key);
        EntityStore::<ContentItem>::save(&store, &mut about).unwrap();
        let serializer = ContentSerializer::new(store);

        let doc = serializer.serialize(&about).into_item().unwrap();

        assert_eq!(doc.info.path.as_deref(), Some("/Home/About"));
        assert_eq!(doc.info.level, 2);
        assert_eq!(doc.info.parent.unwrap().key, Some(home.key));
    }

    #[test]
    fn test_second_pass_moves_under_batch_parent() {
        let serializer = ContentSerializer::new(store_with_page_type());
        let parent_doc = content_doc("Home", None);
        let child_doc = content_doc("About", Some(parent_doc.key()));
        let options = SerializerOptions::report();

        let parent = serializer.deserialize(&parent_doc, &options).into_item().unwrap();
        let child = serializer.deserialize(&child_doc, &options).into_item().unwrap();
        assert_eq!(child.parent_key, None);

        let batch = BatchItems::new([&parent]);
        let attempt = serializer.deserialize_second_pass(child, &child_doc, &options, &batch);

        assert_eq!(attempt.change_type(), ChangeType::Update);
        assert_eq!(attempt.item().unwrap().parent_key, Some(parent_doc.key()));
    }
}
