use serde_json::Value;
use treesync_core::document::{DocRef, Info, PropertyDefinition, PropertyEntry, PropertyValue, Tab};
use treesync_core::import::{BatchReport, HandlerRegistry, ImportBatch};
use treesync_core::store::MemoryStore;
use treesync_core::{Document, EntityKind, SerializerOptions};
use uuid::Uuid;

/// Stable key derived from a small number, so tests can refer to documents
/// before they are imported
#[allow(dead_code)]
pub fn key(n: u128) -> Uuid {
    Uuid::from_u128(0x7000_0000_0000_0000_0000_0000_0000_0000 + n)
}

/// A memory store with view files for the given template aliases
#[allow(dead_code)]
pub fn store_with_views(aliases: &[&str]) -> MemoryStore {
    let store = MemoryStore::new();
    for alias in aliases {
        store
            .add_view(alias, &format!("@* {} *@", alias))
            .unwrap();
    }
    store
}

#[allow(dead_code)]
pub fn template_doc(n: u128, alias: &str, master: Option<&str>) -> Document {
    let mut info = Info::new(key(n), alias, alias.to_uppercase());
    info.parent = master.map(|m| DocRef::new(m, None));
    Document::new(EntityKind::Template, info)
}

/// A content type document with `(alias, editor)` property definitions on a
/// single "Content" tab
#[allow(dead_code)]
pub fn content_type_doc(n: u128, alias: &str, properties: &[(&str, &str)]) -> Document {
    let mut doc = Document::new(EntityKind::ContentType, Info::new(key(n), alias, alias));
    doc.tabs.push(Tab {
        name: "Content".to_string(),
        sort_order: 1,
    });
    doc.properties = properties
        .iter()
        .enumerate()
        .map(|(i, (prop, editor))| {
            PropertyEntry::Definition(PropertyDefinition {
                key: key(n * 100 + i as u128 + 1),
                alias: prop.to_string(),
                name: prop.to_string(),
                editor: editor.to_string(),
                mandatory: false,
                validation: None,
                description: None,
                tab: Some("Content".to_string()),
                sort_order: i as i32,
                member: None,
            })
        })
        .collect();
    doc
}

/// A content document under an optional parent, with a single `title` value
#[allow(dead_code)]
pub fn content_doc(n: u128, name: &str, parent: Option<(u128, &str)>, content_type: &str) -> Document {
    let mut info = Info::new(key(n), name, name);
    info.content_type = Some(content_type.to_string());
    info.parent = parent.map(|(p, alias)| DocRef::new(alias, Some(key(p))));
    info.sort_order = Some(0);
    info.published = Some(true);
    let mut doc = Document::new(EntityKind::Content, info);
    doc.properties.push(PropertyEntry::Value(PropertyValue {
        alias: "title".to_string(),
        value: Value::from(format!("Welcome to {}", name)),
    }));
    doc
}

#[allow(dead_code)]
pub fn import(store: &MemoryStore, documents: Vec<Document>) -> BatchReport {
    let mut registry = HandlerRegistry::standard(store.clone());
    ImportBatch::new(&mut registry, documents, SerializerOptions::apply()).run()
}

#[allow(dead_code)]
pub fn report(store: &MemoryStore, documents: Vec<Document>) -> BatchReport {
    let mut registry = HandlerRegistry::standard(store.clone());
    ImportBatch::new(&mut registry, documents, SerializerOptions::report()).run()
}
