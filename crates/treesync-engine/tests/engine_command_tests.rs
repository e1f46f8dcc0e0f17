#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{check, export, import, key, report, seed_site, Workspace};
use serde_json::Value;
use std::fs;
use treesync_core::document::PropertyEntry;
use treesync_core::errors::ExErrorKind;
use treesync_core::import::{BatchState, CancelToken};
use treesync_core::logging_facility::test_capture::init_test_capture;
use treesync_core::model::{ContentItem, ContentType};
use treesync_core::policy::{DELETE_EMPTY_FOLDERS, USE_GUID_FILENAMES};
use treesync_core::store::{ContainerStore, EntityStore};
use treesync_core::{ChangeKind, ChangeType, Document, EntityKind, HandlerSettings};
use treesync_core_types::schema::{EVENT_END, EVENT_START};
use treesync_core_types::{RequestContext, TraceId};
use treesync_engine::commands::export::ExportOutcome;
use treesync_engine::{apply_engine_command, EngineCommand, EngineCommandResult};
use treesync_store::HandlerConfig;

fn set_title(doc: &mut Document, title: &str) {
    for entry in doc.properties.iter_mut() {
        if let PropertyEntry::Value(value) = entry {
            if value.alias == "title" {
                value.value = Value::from(title);
            }
        }
    }
}

#[test]
fn test_export_writes_one_file_per_entity_then_nothing() {
    // GIVEN a seeded site
    let ws = Workspace::new(&["master", "page"]);
    let store = ws.store();
    seed_site(store.inner());
    let mut ctx = ws.context(&store);

    // WHEN exported twice
    let first = export(&mut ctx);
    let second = export(&mut ctx);

    // THEN the first run writes every entity under its alias or name
    assert!(first.is_success());
    assert_eq!(first.written().count(), 5);
    assert_eq!(ws.files(EntityKind::Template), vec!["master.json", "page.json"]);
    assert_eq!(ws.files(EntityKind::ContentType), vec!["page.json"]);
    assert_eq!(ws.files(EntityKind::Content), vec!["About.json", "Home.json"]);

    // AND the second finds every file current
    assert_eq!(second.items.len(), 5);
    assert!(second
        .items
        .iter()
        .all(|item| item.outcome == ExportOutcome::Unchanged && item.change_type() == ChangeType::NoChange));
}

#[test]
fn test_exported_folder_imports_into_empty_store() {
    // GIVEN a folder exported from a seeded site
    let ws = Workspace::new(&["master", "page"]);
    let source = ws.store();
    seed_site(source.inner());
    export(&mut ws.context(&source));

    // WHEN imported into an empty store
    let target = ws.store();
    let mut ctx = ws.context(&target);
    let imported = import(&mut ctx);

    // THEN everything is created and the folder matches the new store
    assert!(imported.is_success(), "{:?}", imported.batch.failures().collect::<Vec<_>>());
    assert_eq!(imported.batch.state, BatchState::Pass2Applied);
    assert!(!imported.no_save);
    let about: ContentItem = target.get_by_key(key(21)).unwrap().unwrap();
    assert_eq!(about.parent_key, Some(key(20)));

    let drift = check(&mut ctx);
    assert_eq!(drift.checked, 5);
    assert!(drift.is_current(), "{:?}", drift.items);
}

#[test]
fn test_report_lists_changes_without_saving() {
    // GIVEN an imported site whose home page file was then edited
    let ws = Workspace::new(&["master", "page"]);
    let store = ws.store();
    seed_site(store.inner());
    let mut ctx = ws.context(&store);
    export(&mut ctx);
    let mut home = ctx.folder.read(EntityKind::Content, "Home").unwrap().unwrap();
    set_title(&mut home.document, "Hello");
    ctx.folder
        .write(EntityKind::Content, "Home", &home.document)
        .unwrap();
    store.inner().clear_save_log().unwrap();

    // WHEN a report runs
    let dry = report(&mut ctx);

    // THEN only the edited value is reported and nothing was saved
    assert!(dry.no_save);
    assert_eq!(dry.batch.change_count(), 1);
    let changed: Vec<_> = dry.batch.changed().collect();
    assert_eq!(changed[0].alias, "Home");
    assert_eq!(changed[0].changes()[0].path, "title");
    assert!(store.inner().save_log().is_empty());

    // AND the real import applies exactly that with a single save
    let real = import(&mut ctx);
    assert_eq!(real.batch.change_count(), 1);
    assert_eq!(store.inner().save_count(key(20)), 1);
    let saved: ContentItem = store.get_by_key(key(20)).unwrap().unwrap();
    assert_eq!(saved.values["title"], "Hello");
}

#[test]
fn test_check_reports_edits_and_missing_entities() {
    // GIVEN an exported site
    let ws = Workspace::new(&["master", "page"]);
    let store = ws.store();
    seed_site(store.inner());
    let mut ctx = ws.context(&store);
    export(&mut ctx);

    // WHEN a file is edited and an entity is deleted from the store
    let mut home = ctx.folder.read(EntityKind::Content, "Home").unwrap().unwrap();
    set_title(&mut home.document, "Edited");
    ctx.folder
        .write(EntityKind::Content, "Home", &home.document)
        .unwrap();
    let about: ContentItem = store.get_by_key(key(21)).unwrap().unwrap();
    EntityStore::<ContentItem>::delete(&store, &about).unwrap();
    let drift = check(&mut ctx);

    // THEN both show up as drift and nothing else does
    assert!(!drift.is_current());
    assert_eq!(drift.items.len(), 2);
    let about = drift.items.iter().find(|i| i.key == key(21)).unwrap();
    assert_eq!(about.changes[0].change, ChangeKind::New);
    let home = drift.items.iter().find(|i| i.key == key(20)).unwrap();
    assert_eq!(home.changes.len(), 1);
    assert_eq!(home.changes[0].path, "title/value");
    assert_eq!(home.changes[0].new_value.as_deref(), Some("Edited"));
}

#[test]
fn test_guid_file_names() {
    // GIVEN content configured for key-based file names
    let mut ws = Workspace::new(&[]);
    ws.configure(
        EntityKind::Content,
        HandlerSettings::new().with(USE_GUID_FILENAMES, "true"),
    );
    let store = ws.store();
    seed_site(store.inner());

    // WHEN exported
    export(&mut ws.context(&store));

    // THEN content files are named by key and other kinds are not affected
    let mut expected = vec![format!("{}.json", key(20)), format!("{}.json", key(21))];
    expected.sort();
    assert_eq!(ws.files(EntityKind::Content), expected);
    assert_eq!(ws.files(EntityKind::ContentType), vec!["page.json"]);
}

#[test]
fn test_same_name_at_other_level_gets_key_suffix() {
    // GIVEN a root page named like a nested one
    let ws = Workspace::new(&[]);
    let store = ws.store();
    seed_site(store.inner());
    let mut twin = ContentItem::new(key(22), "About", "page");
    twin.sort_order = 2;
    store.save(&mut twin).unwrap();
    let mut ctx = ws.context(&store);

    // WHEN exported twice
    let first = export(&mut ctx);
    let second = export(&mut ctx);

    // THEN both pages get their own file and the names are stable
    assert_eq!(first.written().count(), 6);
    let content = ws.files(EntityKind::Content);
    assert_eq!(content.len(), 3);
    assert!(content.contains(&"About.json".to_string()));
    assert_eq!(
        content.iter().filter(|f| f.starts_with("About_")).count(),
        1
    );
    assert_eq!(second.written().count(), 0);
}

#[test]
fn test_import_removes_emptied_containers_when_enabled() {
    // GIVEN a type filed under Old/Blocks whose document now says "New"
    let mut ws = Workspace::new(&["master", "page"]);
    ws.configure(
        EntityKind::ContentType,
        HandlerSettings::new().with(DELETE_EMPTY_FOLDERS, "true"),
    );
    let store = ws.store();
    seed_site(store.inner());
    store
        .ensure_container(EntityKind::ContentType, "Old/Blocks")
        .unwrap();
    let mut page: ContentType = store.get_by_key(key(10)).unwrap().unwrap();
    page.folder = Some("Old/Blocks".to_string());
    store.save(&mut page).unwrap();
    let mut ctx = ws.context(&store);
    export(&mut ctx);
    let mut doc = ctx.folder.read(EntityKind::ContentType, "page").unwrap().unwrap();
    doc.document.info.folder = Some("New".to_string());
    ctx.folder
        .write(EntityKind::ContentType, "page", &doc.document)
        .unwrap();

    // WHEN imported
    let imported = import(&mut ctx);

    // THEN the type moved and the old folders were removed innermost first
    assert!(imported.is_success());
    let names: Vec<&str> = imported
        .removed_containers
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["Blocks", "Old"]);
    let page: ContentType = store.get_by_key(key(10)).unwrap().unwrap();
    assert_eq!(page.folder.as_deref(), Some("New"));
}

#[test]
fn test_delete_marker_file_removes_entity() {
    // GIVEN an exported site whose About file became a delete marker
    let ws = Workspace::new(&["master", "page"]);
    let store = ws.store();
    seed_site(store.inner());
    let mut ctx = ws.context(&store);
    export(&mut ctx);
    let marker = Document::delete_marker(EntityKind::Content, key(21), "About");
    ctx.folder
        .write(EntityKind::Content, "About", &marker)
        .unwrap();

    // WHEN imported
    let imported = import(&mut ctx);

    // THEN the page is gone and the delete is reported
    let about = imported.batch.items.iter().find(|i| i.alias == "About").unwrap();
    assert_eq!(about.change_type(), ChangeType::Delete);
    let gone: Option<ContentItem> = store.get_by_key(key(21)).unwrap();
    assert!(gone.is_none());
}

#[test]
fn test_disabled_kind_is_neither_exported_nor_imported() {
    // GIVEN content disabled in the settings
    let mut ws = Workspace::new(&["master", "page"]);
    ws.settings = ws.settings.clone().with_handler(
        EntityKind::Content,
        HandlerConfig {
            enabled: false,
            settings: HandlerSettings::new(),
        },
    );
    let store = ws.store();
    seed_site(store.inner());

    // WHEN exported
    let exported = export(&mut ws.context(&store));

    // THEN no content files exist
    assert_eq!(exported.items.len(), 3);
    assert!(ws.files(EntityKind::Content).is_empty());
}

#[test]
fn test_unreadable_file_aborts_before_any_save() {
    // GIVEN a folder with a valid template and a corrupt content file
    let ws = Workspace::new(&["master", "page"]);
    let source = ws.store();
    seed_site(source.inner());
    export(&mut ws.context(&source));
    fs::write(ws.root().join("Content").join("Broken.json"), "{").unwrap();

    // WHEN imported into an empty store
    let target = ws.store();
    let err = apply_engine_command(
        EngineCommand::Import { cancel: None },
        &mut ws.context(&target),
        &RequestContext::new(),
    )
    .unwrap_err();

    // THEN the command fails and the store is untouched
    assert_eq!(err.kind(), ExErrorKind::Serialization);
    assert!(err.entity_id().unwrap().ends_with("Broken.json"));
    assert!(err.request_id().is_some());
    assert!(target.inner().save_log().is_empty());
}

#[test]
fn test_cancelled_import_saves_nothing() {
    let ws = Workspace::new(&["master", "page"]);
    let source = ws.store();
    seed_site(source.inner());
    export(&mut ws.context(&source));
    let cancel = CancelToken::new();
    cancel.cancel();

    let target = ws.store();
    let result = apply_engine_command(
        EngineCommand::Import {
            cancel: Some(cancel),
        },
        &mut ws.context(&target),
        &RequestContext::new(),
    )
    .unwrap();

    let EngineCommandResult::Import(report) = result else {
        panic!("expected an import report");
    };
    assert_eq!(report.batch.state, BatchState::Pass1Failed);
    assert!(report.removed_containers.is_empty());
    assert!(target.inner().save_log().is_empty());
}

#[test]
fn test_export_logs_boundaries() {
    let capture = init_test_capture();
    let ws = Workspace::new(&[]);
    let store = ws.store();
    seed_site(store.inner());

    export(&mut ws.context(&store));

    capture.assert_event_exists("export", EVENT_START);
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some("export")
            && e.event.as_deref() == Some(EVENT_END)
            && e.field("change_count") == Some("5")
    });
    assert!(ends >= 1);
}

#[test]
fn test_trace_id_is_logged_and_reported() {
    // GIVEN a caller-supplied trace id
    let capture = init_test_capture();
    let ws = Workspace::new(&["master", "page"]);
    let store = ws.store();
    seed_site(store.inner());
    let mut ctx = ws.context(&store);
    export(&mut ctx);
    let trace = TraceId::from("trace-check-7".to_string());
    let request = RequestContext::new().with_trace_id(trace.clone());

    // WHEN a check runs under it
    let result = apply_engine_command(EngineCommand::Check, &mut ctx, &request).unwrap();

    // THEN the report and the start event both carry it
    let drift = match result {
        EngineCommandResult::Check(drift) => drift,
        other => panic!("unexpected result {:?}", other),
    };
    assert_eq!(drift.trace_id, Some(trace));
    let starts = capture.count_events(|e| {
        e.op.as_deref() == Some("check")
            && e.event.as_deref() == Some(EVENT_START)
            && e.field("trace_id") == Some("trace-check-7")
    });
    assert_eq!(starts, 1);
}
