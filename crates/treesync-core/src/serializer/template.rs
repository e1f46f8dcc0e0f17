//! Template serializer
//!
//! Templates reference their master template by alias. The master may be
//! created by the same batch, so it is only resolved in pass 2. A template
//! that does not exist yet can only be created when its view file is
//! present.

use uuid::Uuid;

use super::{
    chain_depth, locate, prepare, resolve_alias, BatchItems, SecondPass, SerializerOptions, MAX_CHAIN_DEPTH,
    SyncSerializer,
};
use crate::attempt::{ChangeLog, ChangeRecord, ChangeType, SyncAttempt};
use crate::document::{DocRef, Document, Info};
use crate::errors::{Result, SyncError};
use crate::model::{EntityKind, SyncEntity, Template};
use crate::store::{EntityStore, ViewResolver};

pub struct TemplateSerializer<S> {
    store: S,
}

impl<S> TemplateSerializer<S>
where
    S: EntityStore<Template> + ViewResolver,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn lookup(&self, alias: &str) -> Option<Template> {
        self.store.get_by_alias(alias).ok().flatten()
    }

    /// Master chain length plus one; bounded so cycles terminate
    fn level(&self, item: &Template) -> u32 {
        let depth = chain_depth(item.master_alias.clone(), |alias| {
            self.lookup(alias).and_then(|master| master.master_alias)
        });
        (1 + depth).min(MAX_CHAIN_DEPTH)
    }

    fn create(&self, doc: &Document) -> Result<Template> {
        let Some(view) = self.store.read_view(doc.alias())? else {
            return Err(SyncError::DependencyMissing {
                alias: doc.alias().to_string(),
                message: format!("The template '{}.cshtml' file is missing.", doc.alias()),
            });
        };
        let mut template = Template::new(doc.key(), doc.alias(), &doc.info.name);
        template.content = view;
        Ok(template)
    }
}

impl<S> SyncSerializer for TemplateSerializer<S>
where
    S: EntityStore<Template> + ViewResolver,
{
    type Item = Template;

    fn serialize(&self, item: &Template) -> SyncAttempt<Document> {
        let mut info = Info::new(item.key, item.alias.clone(), item.name.clone());
        info.level = self.level(item);
        info.parent = item
            .master_alias
            .as_deref()
            .map(|alias| DocRef::new(alias, self.lookup(alias).map(|m| m.key)));

        let doc = Document::new(EntityKind::Template, info).into_canonical();
        SyncAttempt::succeed(item.alias.clone(), doc, ChangeType::Export, Vec::new())
    }

    fn deserialize(&self, doc: &Document, _options: &SerializerOptions) -> SyncAttempt<Template> {
        let doc = match prepare(doc, EntityKind::Template) {
            Ok(doc) => doc,
            Err(err) => return SyncAttempt::fail_with(doc.alias(), ChangeType::Import, err),
        };

        let mut changes = ChangeLog::new();
        let found = match locate(&self.store, &doc) {
            Ok(found) => found,
            Err(err) => return SyncAttempt::fail_with(doc.alias(), ChangeType::Import, err),
        };
        let mut item = match found {
            Some(item) => item,
            None => match self.create(&doc) {
                Ok(item) => {
                    changes.push(ChangeRecord::added("New", "Info", doc.alias()));
                    item
                }
                Err(err) => return SyncAttempt::fail_with(doc.alias(), ChangeType::Import, err),
            },
        };

        changes.track("Key", "Info/Key", &mut item.key, doc.key());
        changes.track_text("Name", "Info/Name", &mut item.name, doc.info.name.clone());
        changes.track("Alias", "Info/Alias", &mut item.alias, doc.info.alias.clone());
        if doc.parent_alias().is_none() {
            changes.track_opt("Parent", "Info/Parent", &mut item.master_alias, None);
        }

        let records = changes.into_records();
        let change_type = ChangeType::from_changes(item.is_new(), &records);
        SyncAttempt::succeed(doc.alias(), item, change_type, records)
    }

    fn as_second_pass(&self) -> Option<&dyn SecondPass<Template>> {
        Some(self)
    }

    fn save(&self, item: &mut Template) -> Result<()> {
        self.store.save(item)
    }

    fn delete(&self, item: &Template) -> Result<()> {
        self.store.delete(item)
    }

    fn find(&self, key: Uuid) -> Result<Option<Template>> {
        self.store.get_by_key(key)
    }

    fn items(&self) -> Result<Vec<Template>> {
        self.store.list()
    }
}

impl<S> SecondPass<Template> for TemplateSerializer<S>
where
    S: EntityStore<Template> + ViewResolver,
{
    fn deserialize_second_pass(
        &self,
        mut item: Template,
        doc: &Document,
        options: &SerializerOptions,
        batch: &BatchItems<'_, Template>,
    ) -> SyncAttempt<Template> {
        let mut changes = ChangeLog::new();

        let master = doc
            .parent_alias()
            .filter(|alias| !alias.eq_ignore_ascii_case(&item.alias))
            .and_then(|alias| resolve_alias(&self.store, batch, alias))
            .map(|(alias, _)| alias);
        if let Some(master) = master {
            let unchanged = item
                .master_alias
                .as_deref()
                .is_some_and(|current| current.eq_ignore_ascii_case(&master));
            if !unchanged {
                changes.track_opt("Parent", "Info/Parent", &mut item.master_alias, Some(master));
            }
        }

        let records = changes.into_records();
        if !records.is_empty() && !options.no_save && !item.is_new() {
            if let Err(err) = self.store.save(&mut item) {
                return SyncAttempt::fail_with(item.alias.clone(), ChangeType::Update, err);
            }
        }
        let change_type = if records.is_empty() {
            ChangeType::NoChange
        } else {
            ChangeType::Update
        };
        SyncAttempt::succeed(item.alias.clone(), item, change_type, records)
    }
}
