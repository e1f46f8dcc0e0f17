#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{import, store_with_views, template_doc};
use treesync_core::errors::SyncError;
use treesync_core::logging_facility::test_capture::init_test_capture;
use treesync_core::{log_op_end, log_op_error, log_op_start};
use treesync_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    capture.assert_event_exists(op_name, EVENT_START);
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let end_events: Vec<_> = capture
        .events_for_op(op_name)
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END))
        .collect();

    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = SyncError::DependencyMissing {
        alias: "home".to_string(),
        message: "The template 'home.cshtml' file is missing.".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let error_event = capture
        .events_for_op(op_name)
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    assert_eq!(error_event.field("err.code"), Some("ERR_DEPENDENCY_MISSING"));
    assert_eq!(
        error_event.field("message"),
        Some("The template 'home.cshtml' file is missing.")
    );
}

#[test]
fn test_log_macros_with_multiple_fields() {
    let capture = init_test_capture();
    let op_name = "test_log_macros_fields_unique_4";

    log_op_start!(op_name, kind = "template", alias = "master");

    let start_event = capture
        .events_for_op(op_name)
        .into_iter()
        .next()
        .expect("Should have start event");

    assert_eq!(start_event.field("kind"), Some("template"));
    assert_eq!(start_event.field("alias"), Some("master"));
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_import_batch_logs_boundaries() {
    // GIVEN a capturing subscriber
    let capture = init_test_capture();
    let store = store_with_views(&["master"]);

    // WHEN a batch runs
    let report = import(&store, vec![template_doc(1, "master", None)]);

    // THEN the batch boundary was logged with its counts
    assert!(report.is_success());
    capture.assert_event_exists("import_batch", EVENT_START);
    let ends = capture.count_events(|e| {
        e.op.as_deref() == Some("import_batch")
            && e.event.as_deref() == Some(EVENT_END)
            && e.field("failure_count").is_some()
    });
    assert!(ends >= 1);
}
