//! Engine-level commands over the document folder.

use treesync_core::import::CancelToken;
use treesync_core::store::SiteStore;
use treesync_core::SerializerOptions;
use treesync_core_types::RequestContext;
use treesync_store::errors::Result;

use crate::commands::check::{check_folder, DriftReport};
use crate::commands::export::{export_all, ExportReport};
use crate::commands::sync::{sync_folder, SyncReport};
use crate::startup::SyncContext;

/// Commands that move documents between the folder and the store.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Write every live entity to the folder.
    Export,
    /// Apply every document in the folder to the store.
    Import { cancel: Option<CancelToken> },
    /// Same as import, but only report what would change.
    Report { cancel: Option<CancelToken> },
    /// Compare the folder with the live store without changing either.
    Check,
}

/// Result of applying an engine command.
#[derive(Debug, Clone)]
pub enum EngineCommandResult {
    Export(ExportReport),
    Import(SyncReport),
    Report(SyncReport),
    Check(DriftReport),
}

/// Apply an engine command.
///
/// # Errors
///
/// File I/O and decoding failures, and store failures that affect a whole
/// kind. Per-entity failures are reported inside the result.
pub fn apply_engine_command<S: SiteStore>(
    cmd: EngineCommand,
    ctx: &mut SyncContext<S>,
    request: &RequestContext,
) -> Result<EngineCommandResult> {
    match cmd {
        EngineCommand::Export => export_all(&ctx.registry, &ctx.folder, request).map(EngineCommandResult::Export),
        EngineCommand::Import { cancel } => {
            sync_folder(ctx, SerializerOptions::apply(), cancel, request).map(EngineCommandResult::Import)
        }
        EngineCommand::Report { cancel } => {
            sync_folder(ctx, SerializerOptions::report(), cancel, request).map(EngineCommandResult::Report)
        }
        EngineCommand::Check => check_folder(&ctx.registry, &ctx.folder, request).map(EngineCommandResult::Check),
    }
}
