//! Schema serializers (content types and member types)
//!
//! Both kinds share one implementation over [`SchemaEntity`]; member types
//! only add per-property access flags and protect the built-in member
//! properties.
//!
//! Pass 1 applies identity, info fields, tabs and property definitions, plus
//! compositions when every composed type already exists in the store. Pass 2
//! resolves the parent type, any deferred compositions and the allowed child
//! types.

use std::collections::HashSet;
use std::marker::PhantomData;
use uuid::Uuid;

use super::{
    chain_depth, locate, prepare, resolve_alias, same_aliases, BatchItems, SecondPass,
    SerializerOptions, SyncSerializer,
};
use crate::attempt::{ChangeLog, ChangeRecord, ChangeType, SyncAttempt};
use crate::document::{DocRef, Document, Info, PropertyDefinition, PropertyEntry, Tab};
use crate::errors::Result;
use crate::model::{
    is_builtin_member_property, ContentType, MemberAccess, MemberType, PropertyGroup, PropertyType,
    SyncEntity,
};
use crate::store::{ContainerStore, EntityStore};

/// A live entity whose shape is a [`ContentType`]
pub trait SchemaEntity: SyncEntity {
    /// Fresh, unsaved instance
    fn create(key: Uuid, alias: &str, name: &str) -> Self;

    fn schema(&self) -> &ContentType;

    fn schema_mut(&mut self) -> &mut ContentType;

    fn export_property(&self, property: &PropertyType) -> PropertyDefinition {
        definition_from(property)
    }

    /// Apply the kind-specific parts of an incoming definition
    fn import_property_extras(&mut self, _def: &PropertyDefinition, _changes: &mut ChangeLog) {}

    /// Properties an import never removes
    fn is_locked_property(&self, _alias: &str) -> bool {
        false
    }

    fn remove_property(&mut self, alias: &str) {
        self.schema_mut().properties.retain(|p| p.alias != alias);
    }
}

impl SchemaEntity for ContentType {
    fn create(key: Uuid, alias: &str, name: &str) -> Self {
        ContentType::new(key, alias, name)
    }

    fn schema(&self) -> &ContentType {
        self
    }

    fn schema_mut(&mut self) -> &mut ContentType {
        self
    }
}

impl SchemaEntity for MemberType {
    fn create(key: Uuid, alias: &str, name: &str) -> Self {
        MemberType::new(key, alias, name)
    }

    fn schema(&self) -> &ContentType {
        &self.base
    }

    fn schema_mut(&mut self) -> &mut ContentType {
        &mut self.base
    }

    /// Built-in properties get a nil key: their keys differ per install.
    fn export_property(&self, property: &PropertyType) -> PropertyDefinition {
        let mut def = definition_from(property);
        if is_builtin_member_property(&property.alias) {
            def.key = Uuid::nil();
        }
        def.member = Some(self.access(&property.alias).into());
        def
    }

    fn import_property_extras(&mut self, def: &PropertyDefinition, changes: &mut ChangeLog) {
        let Some(incoming) = def.member else {
            return;
        };
        let incoming = MemberAccess::from(incoming);
        let mut current = self.access(&def.alias);
        let path = |flag: &str| format!("{}/{}", def.alias, flag);

        let mut changed = changes.track("CanEdit", &path("CanEdit"), &mut current.can_edit, incoming.can_edit);
        changed |= changes.track("CanView", &path("CanView"), &mut current.can_view, incoming.can_view);
        changed |= changes.track(
            "IsSensitive",
            &path("IsSensitive"),
            &mut current.is_sensitive,
            incoming.is_sensitive,
        );
        if changed || !self.member_access.contains_key(&def.alias) {
            self.member_access.insert(def.alias.clone(), current);
        }
    }

    fn is_locked_property(&self, alias: &str) -> bool {
        is_builtin_member_property(alias)
    }

    fn remove_property(&mut self, alias: &str) {
        self.base.properties.retain(|p| p.alias != alias);
        self.member_access.remove(alias);
    }
}

/// Serializer for any [`SchemaEntity`] kind
pub struct SchemaSerializer<T, S> {
    store: S,
    _kind: PhantomData<fn() -> T>,
}

pub type ContentTypeSerializer<S> = SchemaSerializer<ContentType, S>;
pub type MemberTypeSerializer<S> = SchemaSerializer<MemberType, S>;

impl<T, S> SchemaSerializer<T, S>
where
    T: SchemaEntity,
    S: EntityStore<T> + ContainerStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    fn lookup(&self, alias: &str) -> Option<T> {
        EntityStore::<T>::get_by_alias(&self.store, alias)
            .ok()
            .flatten()
    }

    fn reference(&self, alias: &str) -> DocRef {
        DocRef::new(alias, self.lookup(alias).map(|t| t.key()))
    }

    fn apply_info(&self, item: &mut T, doc: &Document, changes: &mut ChangeLog) {
        let schema = item.schema_mut();
        changes.track("Key", "Info/Key", &mut schema.key, doc.key());
        changes.track("Alias", "Info/Alias", &mut schema.alias, doc.info.alias.clone());
        changes.track_text("Name", "Info/Name", &mut schema.name, doc.info.name.clone());
        changes.track_text_opt("Icon", "Info/Icon", &mut schema.icon, doc.info.icon.clone());
        changes.track_text_opt(
            "Description",
            "Info/Description",
            &mut schema.description,
            doc.info.description.clone(),
        );
        changes.track_text_opt("Folder", "Info/Folder", &mut schema.folder, doc.info.folder.clone());

        // a parent that is gone can be cleared now; a new one waits for pass 2
        if doc.parent_alias().is_none() {
            changes.track_opt("Parent", "Info/Parent", &mut schema.parent_alias, None);
        }
    }

    fn apply_properties(&self, item: &mut T, doc: &Document, changes: &mut ChangeLog) {
        for def in doc.definitions() {
            let schema = item.schema_mut();
            let position = schema
                .properties
                .iter()
                .position(|p| !def.key.is_nil() && p.key == def.key)
                .or_else(|| {
                    schema
                        .properties
                        .iter()
                        .position(|p| p.alias.eq_ignore_ascii_case(&def.alias))
                });
            match position {
                Some(index) => update_property(&mut schema.properties[index], def, changes),
                None => {
                    changes.push(ChangeRecord::added("Property", &def.alias, &def.name));
                    schema.properties.push(property_from(def));
                }
            }
            item.import_property_extras(def, changes);
        }

        let incoming: HashSet<String> = doc.definitions().map(|d| d.alias.to_lowercase()).collect();
        let doomed: Vec<String> = item
            .schema()
            .properties
            .iter()
            .filter(|p| !incoming.contains(&p.alias.to_lowercase()))
            .filter(|p| !item.is_locked_property(&p.alias))
            .map(|p| p.alias.clone())
            .collect();
        for alias in doomed {
            changes.push(ChangeRecord::removed("Property", &alias, &alias));
            item.remove_property(&alias);
        }
    }

    /// Compositions go in pass 1 only when nothing has to be deferred
    fn apply_known_compositions(&self, item: &mut T, doc: &Document, changes: &mut ChangeLog) {
        let wanted: Vec<String> = doc.compositions.iter().map(|r| r.alias.clone()).collect();
        if wanted.iter().all(|alias| self.lookup(alias).is_some()) {
            track_aliases(
                "Compositions",
                &mut item.schema_mut().compositions,
                wanted,
                changes,
            );
        }
    }

    fn resolve_refs(&self, batch: &BatchItems<'_, T>, refs: &[DocRef], skip: Option<&str>) -> Vec<String> {
        refs.iter()
            .filter(|r| skip.map_or(true, |own| !r.alias.eq_ignore_ascii_case(own)))
            .filter_map(|r| resolve_alias(&self.store, batch, &r.alias))
            .map(|(alias, _)| alias)
            .collect()
    }
}

impl<T, S> SyncSerializer for SchemaSerializer<T, S>
where
    T: SchemaEntity,
    S: EntityStore<T> + ContainerStore,
{
    type Item = T;

    fn serialize(&self, item: &T) -> SyncAttempt<Document> {
        let schema = item.schema();
        let mut info = Info::new(schema.key, schema.alias.clone(), schema.name.clone());
        info.level = 1 + chain_depth(schema.parent_alias.clone(), |alias| {
            self.lookup(alias)
                .and_then(|parent| parent.schema().parent_alias.clone())
        });
        info.parent = schema.parent_alias.as_deref().map(|alias| self.reference(alias));
        info.folder = schema.folder.clone();
        info.icon = schema.icon.clone();
        info.description = schema.description.clone();

        let mut doc = Document::new(T::KIND, info);
        doc.properties = schema
            .properties
            .iter()
            .map(|p| PropertyEntry::Definition(item.export_property(p)))
            .collect();
        doc.compositions = schema.compositions.iter().map(|a| self.reference(a)).collect();
        doc.structure = schema.allowed_children.iter().map(|a| self.reference(a)).collect();
        doc.tabs = schema
            .groups
            .iter()
            .map(|g| Tab {
                name: g.name.clone(),
                sort_order: g.sort_order,
            })
            .collect();

        SyncAttempt::succeed(schema.alias.clone(), doc.into_canonical(), ChangeType::Export, Vec::new())
    }

    fn deserialize(&self, doc: &Document, _options: &SerializerOptions) -> SyncAttempt<T> {
        let doc = match prepare(doc, T::KIND) {
            Ok(doc) => doc,
            Err(err) => return SyncAttempt::fail_with(doc.alias(), ChangeType::Import, err),
        };
        let existing = match locate::<T, S>(&self.store, &doc) {
            Ok(existing) => existing,
            Err(err) => return SyncAttempt::fail_with(doc.alias(), ChangeType::Import, err),
        };

        let mut changes = ChangeLog::new();
        let mut item = existing.unwrap_or_else(|| {
            changes.push(ChangeRecord::added("New", "Info", doc.alias()));
            T::create(doc.key(), doc.alias(), &doc.info.name)
        });

        self.apply_info(&mut item, &doc, &mut changes);
        apply_tabs(item.schema_mut(), &doc, &mut changes);
        self.apply_properties(&mut item, &doc, &mut changes);
        self.apply_known_compositions(&mut item, &doc, &mut changes);

        let records = changes.into_records();
        let change_type = ChangeType::from_changes(item.is_new(), &records);
        SyncAttempt::succeed(doc.alias(), item, change_type, records)
    }

    fn as_second_pass(&self) -> Option<&dyn SecondPass<T>> {
        Some(self)
    }

    fn save(&self, item: &mut T) -> Result<()> {
        if let Some(folder) = item.schema().folder.as_deref().filter(|f| !f.trim().is_empty()) {
            self.store.ensure_container(T::KIND, folder)?;
        }
        EntityStore::<T>::save(&self.store, item)
    }

    fn delete(&self, item: &T) -> Result<()> {
        EntityStore::<T>::delete(&self.store, item)
    }

    fn find(&self, key: Uuid) -> Result<Option<T>> {
        EntityStore::<T>::get_by_key(&self.store, key)
    }

    fn items(&self) -> Result<Vec<T>> {
        EntityStore::<T>::list(&self.store)
    }
}

impl<T, S> SecondPass<T> for SchemaSerializer<T, S>
where
    T: SchemaEntity,
    S: EntityStore<T> + ContainerStore,
{
    fn deserialize_second_pass(
        &self,
        mut item: T,
        doc: &Document,
        options: &SerializerOptions,
        batch: &BatchItems<'_, T>,
    ) -> SyncAttempt<T> {
        let doc = doc.clone().into_canonical();
        let own_alias = item.alias().to_string();
        let mut changes = ChangeLog::new();

        if let Some(parent) = doc.parent_alias() {
            let resolved = resolve_alias(&self.store, batch, parent)
                .map(|(alias, _)| alias)
                .filter(|alias| !alias.eq_ignore_ascii_case(&own_alias));
            if let Some(alias) = resolved {
                let schema = item.schema_mut();
                let same = schema
                    .parent_alias
                    .as_deref()
                    .is_some_and(|current| current.eq_ignore_ascii_case(&alias));
                if !same {
                    changes.track_opt("Parent", "Info/Parent", &mut schema.parent_alias, Some(alias));
                }
            }
        }

        let compositions = self.resolve_refs(batch, &doc.compositions, Some(&own_alias));
        track_aliases(
            "Compositions",
            &mut item.schema_mut().compositions,
            compositions,
            &mut changes,
        );
        let children = self.resolve_refs(batch, &doc.structure, None);
        track_aliases(
            "Structure",
            &mut item.schema_mut().allowed_children,
            children,
            &mut changes,
        );

        let records = changes.into_records();
        if !records.is_empty() && !options.no_save && !item.is_new() {
            if let Err(err) = SyncSerializer::save(self, &mut item) {
                return SyncAttempt::fail_with(own_alias, ChangeType::Update, err);
            }
        }
        let change_type = if records.is_empty() {
            ChangeType::NoChange
        } else {
            ChangeType::Update
        };
        SyncAttempt::succeed(own_alias, item, change_type, records)
    }
}

fn definition_from(property: &PropertyType) -> PropertyDefinition {
    PropertyDefinition {
        key: property.key,
        alias: property.alias.clone(),
        name: property.name.clone(),
        editor: property.editor.clone(),
        mandatory: property.mandatory,
        validation: property.validation.clone(),
        description: property.description.clone(),
        tab: property.group.clone(),
        sort_order: property.sort_order,
        member: None,
    }
}

fn property_from(def: &PropertyDefinition) -> PropertyType {
    PropertyType {
        key: if def.key.is_nil() { Uuid::new_v4() } else { def.key },
        alias: def.alias.clone(),
        name: def.name.clone(),
        editor: def.editor.clone(),
        mandatory: def.mandatory,
        validation: def.validation.clone(),
        description: def.description.clone(),
        group: def.tab.clone(),
        sort_order: def.sort_order,
    }
}

fn update_property(property: &mut PropertyType, def: &PropertyDefinition, changes: &mut ChangeLog) {
    let path = |field: &str| format!("{}/{}", def.alias, field);
    // nil keys never overwrite
    if !def.key.is_nil() {
        changes.track("Key", &path("Key"), &mut property.key, def.key);
    }
    changes.track("Alias", &path("Alias"), &mut property.alias, def.alias.clone());
    changes.track_text("Name", &path("Name"), &mut property.name, def.name.clone());
    changes.track("Editor", &path("Editor"), &mut property.editor, def.editor.clone());
    changes.track("Mandatory", &path("Mandatory"), &mut property.mandatory, def.mandatory);
    changes.track_text_opt("Validation", &path("Validation"), &mut property.validation, def.validation.clone());
    changes.track_text_opt(
        "Description",
        &path("Description"),
        &mut property.description,
        def.description.clone(),
    );
    changes.track_text_opt("Tab", &path("Tab"), &mut property.group, def.tab.clone());
    changes.track("SortOrder", &path("SortOrder"), &mut property.sort_order, def.sort_order);
}

fn apply_tabs(schema: &mut ContentType, doc: &Document, changes: &mut ChangeLog) {
    for tab in &doc.tabs {
        match schema
            .groups
            .iter_mut()
            .find(|g| g.name.eq_ignore_ascii_case(&tab.name))
        {
            Some(group) => {
                let path = format!("Tabs/{}/SortOrder", tab.name);
                changes.track("SortOrder", &path, &mut group.sort_order, tab.sort_order);
            }
            None => {
                changes.push(ChangeRecord::added("Tab", format!("Tabs/{}", tab.name), &tab.name));
                schema.groups.push(PropertyGroup {
                    name: tab.name.clone(),
                    sort_order: tab.sort_order,
                });
            }
        }
    }

    let keep = |name: &str| {
        doc.tabs.iter().any(|t| t.name.eq_ignore_ascii_case(name))
            || doc
                .definitions()
                .any(|d| d.tab.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(name)))
    };
    let mut removed = Vec::new();
    schema.groups.retain(|g| {
        let kept = keep(&g.name);
        if !kept {
            removed.push(g.name.clone());
        }
        kept
    });
    for name in removed {
        changes.push(ChangeRecord::removed("Tab", format!("Tabs/{}", name), name));
    }
}

/// Replace an alias list when it differs as a set; stored in document order
fn track_aliases(section: &str, target: &mut Vec<String>, wanted: Vec<String>, changes: &mut ChangeLog) {
    if same_aliases(target, &wanted) {
        return;
    }
    changes.push(ChangeRecord::update(
        section,
        section,
        target.join(","),
        wanted.join(","),
    ));
    *target = wanted;
}
