//! Import and report: the document folder into the live store
//!
//! Both read every document of every registered kind and run one
//! [`ImportBatch`]. Report sets `no_save`, so the store is left untouched and
//! the returned report lists the changes an import would make.

use chrono::{DateTime, Utc};
use std::time::Instant;

use treesync_core::import::{BatchState, CancelToken};
use treesync_core::model::Container;
use treesync_core::policy::DELETE_EMPTY_FOLDERS;
use treesync_core::store::SiteStore;
use treesync_core::{log_op_end, log_op_error, log_op_start};
use treesync_core::{BatchReport, Document, HandlerRegistry, ImportBatch, SerializerOptions};
use treesync_core_types::{RequestContext, RequestId, TraceId};
use treesync_store::errors::Result;
use treesync_store::DocumentFolder;

use crate::containers::clean_empty_containers;
use crate::startup::SyncContext;

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub request_id: RequestId,
    pub trace_id: Option<TraceId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True for a report run
    pub no_save: bool,
    pub batch: BatchReport,
    /// Containers deleted after the import because they ended up empty
    pub removed_containers: Vec<Container>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.batch.is_success()
    }
}

/// Import (or, with `no_save`, report on) the whole document folder
///
/// # Errors
///
/// A document file that cannot be read or decoded aborts the run before any
/// entity is touched. So does a store failure while cleaning containers.
/// Per-entity failures are part of the returned report.
pub fn sync_folder<S: SiteStore>(
    ctx: &mut SyncContext<S>,
    options: SerializerOptions,
    cancel: Option<CancelToken>,
    request: &RequestContext,
) -> Result<SyncReport> {
    let op = if options.no_save { "report" } else { "import" };
    let started_at = Utc::now();
    let start = Instant::now();
    log_op_start!(
        op,
        request_id = request.request_id.as_str(),
        trace_id = request.trace_id_str(),
        no_save = options.no_save
    );

    let result = sync_impl(ctx, options, cancel).map_err(|e| {
        let e = e.with_request_id(request.request_id.clone());
        log_op_error!(op, e.clone(), duration_ms = start.elapsed().as_millis() as u64);
        e
    })?;
    let (batch, removed_containers) = result;

    log_op_end!(
        op,
        duration_ms = start.elapsed().as_millis() as u64,
        item_count = batch.items.len(),
        change_count = batch.change_count(),
        failure_count = batch.failures().count()
    );

    Ok(SyncReport {
        request_id: request.request_id.clone(),
        trace_id: request.trace_id.clone(),
        started_at,
        finished_at: Utc::now(),
        no_save: options.no_save,
        batch,
        removed_containers,
    })
}

fn sync_impl<S: SiteStore>(
    ctx: &mut SyncContext<S>,
    options: SerializerOptions,
    cancel: Option<CancelToken>,
) -> Result<(BatchReport, Vec<Container>)> {
    let documents = read_documents(&ctx.registry, &ctx.folder)?;

    let mut batch = ImportBatch::new(&mut ctx.registry, documents, options);
    if let Some(cancel) = cancel {
        batch = batch.with_cancel(cancel);
    }
    let report = batch.run();

    let mut removed = Vec::new();
    if !options.no_save && report.state == BatchState::Pass2Applied {
        for kind in ctx.registry.kinds() {
            let clean = ctx
                .registry
                .settings(kind)
                .is_some_and(|settings| settings.get_bool(DELETE_EMPTY_FOLDERS, false));
            if clean {
                removed.extend(clean_empty_containers(&ctx.store, kind)?);
            }
        }
    }

    Ok((report, removed))
}

/// Documents of every registered kind, kinds in priority order and files in
/// name order within a kind
fn read_documents(registry: &HandlerRegistry, folder: &DocumentFolder) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for kind in registry.kinds() {
        let stored = folder.read_all(kind)?;
        tracing::debug!(kind = %kind, count = stored.len(), "documents read");
        documents.extend(stored.into_iter().map(|s| s.document));
    }
    Ok(documents)
}
