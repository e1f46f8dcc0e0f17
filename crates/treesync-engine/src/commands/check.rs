//! Drift check: stored documents against fresh serializations
//!
//! Nothing is deserialized. Each file is compared with what exporting its
//! entity would produce right now, so the report shows edits made on either
//! side since the last export or import.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use treesync_core::import::KindHandler;
use treesync_core::{compare_documents, log_op_end, log_op_error, log_op_start};
use treesync_core::{ChangeRecord, EntityKind, HandlerRegistry, SyncAction, SyncAttempt};
use treesync_core_types::{RequestContext, RequestId, TraceId};
use treesync_store::errors::Result;
use treesync_store::{DocumentFolder, StoredDocument};

/// A stored document that no longer matches the live entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftItem {
    pub kind: EntityKind,
    pub key: Uuid,
    pub alias: String,
    pub path: PathBuf,
    pub changes: Vec<ChangeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
    pub checked_at: DateTime<Utc>,
    /// Number of files compared
    pub checked: usize,
    pub items: Vec<DriftItem>,
}

impl DriftReport {
    pub fn is_current(&self) -> bool {
        self.items.is_empty()
    }
}

/// Compare every stored document of every registered kind with its entity
///
/// # Errors
///
/// File read and decode errors abort the check, as do store reads that fail.
pub fn check_folder(
    registry: &HandlerRegistry,
    folder: &DocumentFolder,
    request: &RequestContext,
) -> Result<DriftReport> {
    let checked_at = Utc::now();
    let start = Instant::now();
    log_op_start!(
        "check",
        request_id = request.request_id.as_str(),
        trace_id = request.trace_id_str()
    );

    let (checked, items) = check_impl(registry, folder).map_err(|e| {
        let e = e.with_request_id(request.request_id.clone());
        log_op_error!("check", e.clone(), duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;

    log_op_end!(
        "check",
        duration_ms = start.elapsed().as_millis() as u64,
        item_count = checked,
        change_count = items.len()
    );

    Ok(DriftReport {
        request_id: request.request_id.clone(),
        trace_id: request.trace_id.clone(),
        checked_at,
        checked,
        items,
    })
}

fn check_impl(registry: &HandlerRegistry, folder: &DocumentFolder) -> Result<(usize, Vec<DriftItem>)> {
    let mut checked = 0;
    let mut items = Vec::new();
    for kind in registry.kinds() {
        let Some(handler) = registry.handler(kind) else {
            continue;
        };
        for stored in folder.read_all(kind)? {
            checked += 1;
            let changes = drift_of(handler, &stored)?;
            if !changes.is_empty() {
                items.push(DriftItem {
                    kind,
                    key: stored.document.key(),
                    alias: stored.document.alias().to_string(),
                    path: stored.path,
                    changes,
                });
            }
        }
    }
    Ok((checked, items))
}

fn drift_of(handler: &dyn KindHandler, stored: &StoredDocument) -> Result<Vec<ChangeRecord>> {
    let doc = &stored.document;
    let live = handler.export_one(doc.key())?;

    let changes = match (doc.action, live) {
        (SyncAction::Delete, None) => Vec::new(),
        (SyncAction::Delete, Some(_)) => vec![ChangeRecord::removed("Delete", doc.alias(), doc.key())],
        (SyncAction::Update, None) => vec![ChangeRecord::added("New", "Info", doc.alias())],
        (SyncAction::Update, Some(SyncAttempt::Success { item, .. })) => compare_documents(&item, doc),
        (SyncAction::Update, Some(SyncAttempt::Fail { message, .. })) => {
            vec![ChangeRecord::no_change("Error", doc.alias(), message)]
        }
    };
    Ok(changes)
}
