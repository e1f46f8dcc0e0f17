#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{content_doc, content_type_doc, import, key, report, store_with_views, template_doc};
use treesync_core::document::{to_canonical_json, DocRef};
use treesync_core::errors::ExErrorKind;
use treesync_core::import::{BatchState, CancelToken, HandlerRegistry, ImportBatch, ItemOutcome};
use treesync_core::model::{ContentItem, ContentType, Template};
use treesync_core::policy::EXCLUDE;
use treesync_core::store::{EntityStore, MemoryStore};
use treesync_core::{ChangeType, Document, EntityKind, HandlerSettings, SerializerOptions};

fn site() -> Vec<Document> {
    vec![
        template_doc(1, "master", None),
        template_doc(2, "page", Some("master")),
        content_type_doc(10, "page", &[("title", "textbox"), ("body", "rte")]),
        content_doc(20, "Home", None, "page"),
        content_doc(21, "About", Some((20, "Home")), "page"),
    ]
}

fn export_state(store: &MemoryStore) -> Vec<String> {
    let registry = HandlerRegistry::standard(store.clone());
    let mut docs: Vec<String> = registry
        .kinds()
        .into_iter()
        .flat_map(|kind| registry.handler(kind).unwrap().export_all().unwrap())
        .map(|attempt| to_canonical_json(&attempt.into_item().unwrap()).unwrap())
        .collect();
    docs.sort();
    docs
}

#[test]
fn test_master_resolved_in_second_pass_with_one_extra_save() {
    // GIVEN a child template listed before its master
    let store = store_with_views(&["master", "page"]);
    let docs = vec![
        template_doc(2, "page", Some("master")),
        template_doc(1, "master", None),
    ];

    // WHEN the batch is imported
    let report = import(&store, docs);

    // THEN both exist, the child points at the master, and only the child
    // was saved a second time
    assert!(report.is_success());
    assert_eq!(report.state, BatchState::Pass2Applied);
    let page: Template = store.get_by_key(key(2)).unwrap().unwrap();
    assert_eq!(page.master_alias.as_deref(), Some("master"));
    assert_eq!(store.save_count(key(2)), 2);
    assert_eq!(store.save_count(key(1)), 1);
}

#[test]
fn test_second_import_reports_no_change_and_saves_nothing() {
    // GIVEN a site that was imported once
    let store = store_with_views(&["master", "page"]);
    let first = import(&store, site());
    assert!(first.is_success());
    assert!(first.change_count() > 0);
    store.clear_save_log().unwrap();

    // WHEN the same documents are imported again
    let second = import(&store, site());

    // THEN nothing changes and nothing is saved
    assert!(second.is_success());
    assert_eq!(second.change_count(), 0);
    for item in &second.items {
        assert_eq!(item.change_type(), ChangeType::NoChange, "{}", item.alias);
    }
    assert!(store.save_log().is_empty());
}

#[test]
fn test_batch_order_does_not_change_final_state() {
    // GIVEN the same documents in two different orders
    let forward = store_with_views(&["master", "page"]);
    let backward = store_with_views(&["master", "page"]);
    let mut reversed = site();
    reversed.reverse();

    // WHEN each order is imported into its own store
    assert!(import(&forward, site()).is_success());
    assert!(import(&backward, reversed).is_success());

    // THEN both stores export identical documents
    assert_eq!(export_state(&forward), export_state(&backward));
}

#[test]
fn test_child_content_before_parent_is_moved_in_second_pass() {
    // GIVEN a page type and a child listed before its parent
    let store = MemoryStore::new();
    let mut page = ContentType::new(key(10), "page", "Page");
    store.save(&mut page).unwrap();
    let docs = vec![
        content_doc(21, "About", Some((20, "Home")), "page"),
        content_doc(20, "Home", None, "page"),
    ];

    // WHEN imported
    let report = import(&store, docs);

    // THEN the child ends up under the parent after one create and one move
    assert!(report.is_success());
    let about: ContentItem = store.get_by_key(key(21)).unwrap().unwrap();
    assert_eq!(about.parent_key, Some(key(20)));
    assert_eq!(store.save_count(key(21)), 2);
    assert_eq!(report.items[0].change_type(), ChangeType::Create);
}

#[test]
fn test_missing_view_fails_alone() {
    // GIVEN two templates, only one of which has a view file
    let store = store_with_views(&["master"]);
    let docs = vec![template_doc(1, "master", None), template_doc(3, "ghost", None)];

    // WHEN imported
    let report = import(&store, docs);

    // THEN the sibling is created and the batch still completes
    assert_eq!(report.state, BatchState::Pass2Applied);
    assert!(!report.is_success());
    assert!(!report.items[0].is_failure());
    assert!(report.items[1].is_failure());
    assert_eq!(
        report.items[1].message(),
        Some("The template 'ghost.cshtml' file is missing.")
    );
    let ghost: Option<Template> = store.get_by_key(key(3)).unwrap();
    assert!(ghost.is_none());
}

#[test]
fn test_save_failure_is_reported_per_item() {
    // GIVEN a store that refuses to save one content type
    let store = MemoryStore::new();
    store.reject_saves_for("broken").unwrap();
    let docs = vec![
        content_type_doc(10, "broken", &[("title", "textbox")]),
        content_type_doc(11, "fine", &[("title", "textbox")]),
    ];

    // WHEN imported
    let report = import(&store, docs);

    // THEN only that item fails, with the store failure as its cause
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].alias, "broken");
    match &failures[0].outcome {
        ItemOutcome::Applied { first, .. } => {
            assert_eq!(first.cause().map(|c| c.kind()), Some(ExErrorKind::StoreFailure));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    let fine: Option<ContentType> = store.get_by_alias("fine").unwrap();
    assert!(fine.is_some());
}

#[test]
fn test_cancel_during_first_pass() {
    // GIVEN a cancelled token
    let store = store_with_views(&["master"]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut registry = HandlerRegistry::standard(store.clone());

    // WHEN the batch runs
    let report = ImportBatch::new(
        &mut registry,
        vec![template_doc(1, "master", None)],
        SerializerOptions::apply(),
    )
    .with_cancel(cancel)
    .run();

    // THEN pass 1 is marked failed and nothing was touched
    assert_eq!(report.state, BatchState::Pass1Failed);
    assert!(matches!(report.items[0].outcome, ItemOutcome::Cancelled));
    assert!(store.save_log().is_empty());
}

#[test]
fn test_cancel_between_passes_keeps_first_pass_outcomes() {
    // GIVEN a batch whose first pass completed
    let store = store_with_views(&["master", "page"]);
    let cancel = CancelToken::new();
    let mut registry = HandlerRegistry::standard(store.clone());
    let mut batch = ImportBatch::new(
        &mut registry,
        vec![template_doc(2, "page", Some("master")), template_doc(1, "master", None)],
        SerializerOptions::apply(),
    )
    .with_cancel(cancel.clone());
    assert_eq!(batch.first_pass(), BatchState::Pass1Applied);

    // WHEN the batch is cancelled before pass 2
    cancel.cancel();
    let state = batch.second_pass();
    let report = batch.into_report();

    // THEN pass 2 never ran and pass 1 results stay in the report
    assert_eq!(state, BatchState::Pass1Applied);
    assert_eq!(report.state, BatchState::Pass1Applied);
    for item in &report.items {
        match &item.outcome {
            ItemOutcome::Applied { first, second } => {
                assert!(first.is_success(), "{}", item.alias);
                assert!(second.is_none(), "{}", item.alias);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    let page: Template = store.get_by_key(key(2)).unwrap().unwrap();
    assert!(page.master_alias.is_none());
}

#[test]
fn test_excluded_path_is_filtered() {
    // GIVEN content rules excluding a branch
    let store = MemoryStore::new();
    let mut page = ContentType::new(key(10), "page", "Page");
    store.save(&mut page).unwrap();
    let mut registry = HandlerRegistry::standard(store.clone());
    registry.configure(
        EntityKind::Content,
        HandlerSettings::new().with(EXCLUDE, "/Home/Private"),
    );
    let mut private = content_doc(30, "Private", None, "page");
    private.info.path = Some("/Home/Private".to_string());
    let mut public = content_doc(31, "Public", None, "page");
    public.info.path = Some("/Home/Public".to_string());

    // WHEN imported
    let report = ImportBatch::new(&mut registry, vec![private, public], SerializerOptions::apply()).run();

    // THEN the excluded item is filtered and the other applied
    assert!(matches!(report.items[0].outcome, ItemOutcome::Filtered));
    assert_eq!(report.items[1].change_type(), ChangeType::Create);
    let private: Option<ContentItem> = store.get_by_key(key(30)).unwrap();
    assert!(private.is_none());
}

#[test]
fn test_report_mode_matches_import_without_saving() {
    // GIVEN two identical stores
    let dry_store = store_with_views(&["master", "page"]);
    let real_store = store_with_views(&["master", "page"]);
    let docs = vec![
        template_doc(2, "page", Some("master")),
        template_doc(1, "master", None),
        content_type_doc(10, "page", &[("title", "textbox")]),
    ];

    // WHEN one reports and the other imports
    let dry = report(&dry_store, docs.clone());
    let real = import(&real_store, docs);

    // THEN the change records agree and the report saved nothing
    assert!(dry_store.save_log().is_empty());
    assert_eq!(dry.items.len(), real.items.len());
    for (d, r) in dry.items.iter().zip(&real.items) {
        assert_eq!(d.changes(), r.changes(), "{}", d.alias);
    }
}

#[test]
fn test_report_sees_content_type_from_same_batch() {
    // GIVEN a batch that defines a content type and a page using it
    let dry_store = MemoryStore::new();
    let real_store = MemoryStore::new();
    let docs = vec![
        content_doc(20, "Home", None, "page"),
        content_type_doc(10, "page", &[("title", "textbox")]),
    ];

    // WHEN one store reports and the other imports
    let dry = report(&dry_store, docs.clone());
    let real = import(&real_store, docs);

    // THEN both succeed with the same records and the report saved nothing
    let messages: Vec<_> = dry.failures().map(|f| f.message()).collect();
    assert!(dry.is_success(), "{:?}", messages);
    assert!(real.is_success());
    assert!(dry_store.save_log().is_empty());
    for (d, r) in dry.items.iter().zip(&real.items) {
        assert_eq!(d.change_type(), r.change_type(), "{}", d.alias);
        assert_eq!(d.changes(), r.changes(), "{}", d.alias);
    }
    let page: Option<ContentItem> = dry_store.get_by_key(key(20)).unwrap();
    assert!(page.is_none());
}

#[test]
fn test_deferred_parent_and_compositions() {
    // GIVEN a type listed before the types it extends and composes
    let store = MemoryStore::new();
    let mut article = content_type_doc(12, "article", &[("summary", "textarea")]);
    article.info.parent = Some(DocRef::new("base", None));
    article.compositions = vec![DocRef::new("seo", None)];
    article.structure = vec![DocRef::new("article", None)];
    let docs = vec![
        article,
        content_type_doc(13, "base", &[("title", "textbox")]),
        content_type_doc(14, "seo", &[("metaTitle", "textbox")]),
    ];

    // WHEN imported
    let report = import(&store, docs);

    // THEN every reference was resolved in pass 2
    assert!(report.is_success());
    let article: ContentType = store.get_by_key(key(12)).unwrap().unwrap();
    assert_eq!(article.parent_alias.as_deref(), Some("base"));
    assert_eq!(article.compositions, vec!["seo".to_string()]);
    assert_eq!(article.allowed_children, vec!["article".to_string()]);
}

#[test]
fn test_delete_marker_removes_then_reports_no_change() {
    // GIVEN an imported template
    let store = store_with_views(&["master"]);
    assert!(import(&store, vec![template_doc(1, "master", None)]).is_success());
    let marker = Document::delete_marker(EntityKind::Template, key(1), "master");

    // WHEN the delete marker is imported twice
    let first = import(&store, vec![marker.clone()]);
    let second = import(&store, vec![marker]);

    // THEN the first removes it and the second has nothing to do
    assert_eq!(first.items[0].change_type(), ChangeType::Delete);
    assert_eq!(second.items[0].change_type(), ChangeType::NoChange);
    let gone: Option<Template> = store.get_by_key(key(1)).unwrap();
    assert!(gone.is_none());
}

#[test]
fn test_disabled_kind_fails_its_documents() {
    // GIVEN a registry without member types
    let store = MemoryStore::new();
    let mut registry = HandlerRegistry::standard(store);
    registry.disable(EntityKind::MemberType);
    let mut doc = content_type_doc(40, "member", &[]);
    doc.kind = EntityKind::MemberType;

    // WHEN a member type document is imported
    let report = ImportBatch::new(&mut registry, vec![doc], SerializerOptions::apply()).run();

    // THEN it fails with a clear message
    assert!(report.items[0].is_failure());
    assert!(report.items[0]
        .message()
        .unwrap()
        .contains("no handler registered"));
}
