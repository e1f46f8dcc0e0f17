//! Export: live entities to the document folder

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use treesync_core::errors::{ExError, ExErrorKind};
use treesync_core::import::KindHandler;
use treesync_core::policy::{should_export, USE_GUID_FILENAMES};
use treesync_core::{log_op_end, log_op_error, log_op_start};
use treesync_core::{ChangeType, Document, EntityKind, HandlerRegistry, HandlerSettings, SyncAttempt};
use treesync_core_types::{RequestContext, RequestId, TraceId};
use treesync_store::errors::Result;
use treesync_store::DocumentFolder;

use crate::naming::FileNamer;

/// What happened to one entity during export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportOutcome {
    Written,
    /// The file already held this document
    Unchanged,
    /// Rejected by the handler's export rules
    Filtered,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportItem {
    pub kind: EntityKind,
    /// `None` when serialization failed before a key was known
    pub key: Option<Uuid>,
    pub alias: String,
    pub path: Option<PathBuf>,
    pub outcome: ExportOutcome,
}

impl ExportItem {
    pub fn change_type(&self) -> ChangeType {
        match self.outcome {
            ExportOutcome::Written | ExportOutcome::Failed { .. } => ChangeType::Export,
            ExportOutcome::Unchanged | ExportOutcome::Filtered => ChangeType::NoChange,
        }
    }

    fn of(kind: EntityKind, doc: &Document, path: Option<PathBuf>, outcome: ExportOutcome) -> Self {
        Self {
            kind,
            key: Some(doc.key()),
            alias: doc.alias().to_string(),
            path,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<ExportItem>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExportItem> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ExportOutcome::Failed { .. }))
    }

    pub fn written(&self) -> impl Iterator<Item = &ExportItem> {
        self.items
            .iter()
            .filter(|item| item.outcome == ExportOutcome::Written)
    }
}

/// Serialize every entity of every registered kind into `folder`
///
/// # Errors
///
/// Store reads that fail for a whole kind and file I/O errors abort the
/// export. Entities that fail to serialize are reported per item.
pub fn export_all(
    registry: &HandlerRegistry,
    folder: &DocumentFolder,
    request: &RequestContext,
) -> Result<ExportReport> {
    let started_at = Utc::now();
    let start = Instant::now();
    log_op_start!(
        "export",
        request_id = request.request_id.as_str(),
        trace_id = request.trace_id_str(),
        root = %folder.root().display()
    );

    let items = export_impl(registry, folder).map_err(|e| {
        log_op_error!(
            "export",
            e.clone().with_request_id(request.request_id.clone()),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e.with_request_id(request.request_id.clone())
    })?;

    let report = ExportReport {
        request_id: request.request_id.clone(),
        trace_id: request.trace_id.clone(),
        started_at,
        finished_at: Utc::now(),
        items,
    };

    log_op_end!(
        "export",
        duration_ms = start.elapsed().as_millis() as u64,
        item_count = report.items.len(),
        change_count = report.written().count(),
        failure_count = report.failures().count()
    );

    Ok(report)
}

fn export_impl(registry: &HandlerRegistry, folder: &DocumentFolder) -> Result<Vec<ExportItem>> {
    let mut items = Vec::new();
    for kind in registry.kinds() {
        let (Some(handler), Some(settings)) = (registry.handler(kind), registry.settings(kind)) else {
            continue;
        };
        export_kind(handler, settings, folder, &mut items)?;
    }
    Ok(items)
}

fn export_kind(
    handler: &dyn KindHandler,
    settings: &HandlerSettings,
    folder: &DocumentFolder,
    items: &mut Vec<ExportItem>,
) -> Result<()> {
    let kind = handler.kind();
    let mut namer = FileNamer::new(settings.get_bool(USE_GUID_FILENAMES, false), folder.scan(kind)?);
    let mut seen = HashSet::new();

    for attempt in handler.export_all()? {
        let doc = match attempt {
            SyncAttempt::Success { item, .. } => item,
            SyncAttempt::Fail { name, message, .. } => {
                tracing::warn!(kind = %kind, alias = %name, error = %message, "export failed");
                items.push(ExportItem {
                    kind,
                    key: None,
                    alias: name,
                    path: None,
                    outcome: ExportOutcome::Failed { message },
                });
                continue;
            }
        };
        if !seen.insert(doc.key()) {
            tracing::debug!(kind = %kind, key = %doc.key(), "duplicate export skipped");
            continue;
        }
        items.push(write_document(kind, &doc, settings, folder, &mut namer)?);
    }
    Ok(())
}

/// Apply the export rules to one document and file it
pub(crate) fn write_document(
    kind: EntityKind,
    doc: &Document,
    settings: &HandlerSettings,
    folder: &DocumentFolder,
    namer: &mut FileNamer,
) -> Result<ExportItem> {
    if !should_export(doc, settings) {
        tracing::debug!(kind = %kind, alias = %doc.alias(), "export filtered");
        return Ok(ExportItem::of(kind, doc, None, ExportOutcome::Filtered));
    }

    let assignment = namer.assign(doc);
    let written = folder.write(kind, &assignment.stem, doc)?;
    if let Some(previous) = &assignment.replaces {
        folder.remove(kind, previous)?;
    }

    let outcome = if written.changed {
        ExportOutcome::Written
    } else {
        ExportOutcome::Unchanged
    };
    Ok(ExportItem::of(kind, doc, Some(written.path), outcome))
}

/// Turn a failed single-entity export into an error
pub(crate) fn export_failure(kind: EntityKind, key: Uuid, attempt: &SyncAttempt<Document>) -> ExError {
    let base = match attempt.cause() {
        Some(cause) => cause.clone(),
        None => ExError::new(ExErrorKind::Internal).with_message(attempt.message().unwrap_or_default()),
    };
    base.with_op(format!("export_{}", kind)).with_entity_id(key.to_string())
}
