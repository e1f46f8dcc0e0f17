//! Two-pass batch import
//!
//! ```text
//! Pending ──first_pass──▶ Pass1Applied ──second_pass──▶ Pass2Applied
//!    │
//!    └── cancelled during pass 1 ──▶ Pass1Failed
//! ```
//!
//! Pass 1 runs over every document, kind by kind in handler priority order,
//! and saves each entity that changed. Pass 2 only starts after pass 1 has
//! finished for the whole batch. A failing document never stops its
//! siblings; its failure is recorded in the report.

use serde::Serialize;
use std::time::Instant;

use super::cancel::CancelToken;
use super::handler::EntitySummary;
use super::registry::HandlerRegistry;
use crate::attempt::{ChangeRecord, ChangeType, SyncAttempt};
use crate::document::{Document, SyncAction};
use crate::errors::SyncError;
use crate::model::EntityKind;
use crate::policy::should_import;
use crate::serializer::{SerializerOptions, StagedAliases};
use crate::{log_op_end, log_op_start};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Pass1Applied,
    Pass2Applied,
    /// Cancelled before pass 1 completed; pass 2 never runs
    Pass1Failed,
}

/// What happened to one input document
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Rejected by the handler's import rules
    Filtered,
    /// Not reached because the batch was cancelled
    Cancelled,
    Applied {
        first: SyncAttempt<EntitySummary>,
        second: Option<SyncAttempt<EntitySummary>>,
    },
}

/// Report entry for the document at `index` of the input
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub index: usize,
    pub kind: EntityKind,
    pub alias: String,
    pub outcome: ItemOutcome,
}

impl ItemReport {
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            ItemOutcome::Applied { first, second } => {
                !first.is_success() || second.as_ref().is_some_and(|s| !s.is_success())
            }
            ItemOutcome::Filtered | ItemOutcome::Cancelled => false,
        }
    }

    /// Failure message of whichever pass failed
    pub fn message(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Applied { first, second } => first
                .message()
                .or_else(|| second.as_ref().and_then(|s| s.message())),
            ItemOutcome::Filtered | ItemOutcome::Cancelled => None,
        }
    }

    /// Pass 1 records followed by pass 2 records
    pub fn changes(&self) -> Vec<ChangeRecord> {
        match &self.outcome {
            ItemOutcome::Applied { first, second } => first
                .changes()
                .iter()
                .chain(second.iter().flat_map(|s| s.changes()))
                .cloned()
                .collect(),
            ItemOutcome::Filtered | ItemOutcome::Cancelled => Vec::new(),
        }
    }

    /// Overall change type; a pass-2 update lifts a pass-1 `NoChange`
    pub fn change_type(&self) -> ChangeType {
        match &self.outcome {
            ItemOutcome::Applied { first, second } => match (first.change_type(), second) {
                (ChangeType::NoChange, Some(s)) if s.change_type() == ChangeType::Update => ChangeType::Update,
                (change_type, _) => change_type,
            },
            ItemOutcome::Filtered | ItemOutcome::Cancelled => ChangeType::NoChange,
        }
    }

    pub fn summary(&self) -> Option<&EntitySummary> {
        match &self.outcome {
            ItemOutcome::Applied { first, second } => second
                .as_ref()
                .and_then(|s| s.item())
                .or_else(|| first.item()),
            ItemOutcome::Filtered | ItemOutcome::Cancelled => None,
        }
    }
}

/// Outcome of a whole batch, one entry per input document in input order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub state: BatchState,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    /// Completed both passes without a single failed document
    pub fn is_success(&self) -> bool {
        self.state == BatchState::Pass2Applied && !self.items.iter().any(ItemReport::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|item| item.is_failure())
    }

    /// Items that produced at least one change record
    pub fn changed(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|item| !item.changes().is_empty())
    }

    pub fn change_count(&self) -> usize {
        self.items.iter().map(|item| item.changes().len()).sum()
    }
}

/// One import run over a set of documents
pub struct ImportBatch<'r> {
    registry: &'r mut HandlerRegistry,
    documents: Vec<Document>,
    options: SerializerOptions,
    cancel: CancelToken,
    state: BatchState,
    outcomes: Vec<Option<ItemOutcome>>,
    staged: StagedAliases,
}

impl<'r> ImportBatch<'r> {
    pub fn new(registry: &'r mut HandlerRegistry, documents: Vec<Document>, options: SerializerOptions) -> Self {
        registry.reset();
        let outcomes = vec![None; documents.len()];
        Self {
            registry,
            documents,
            options,
            cancel: CancelToken::new(),
            state: BatchState::Pending,
            outcomes,
            staged: StagedAliases::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Both passes, then the report
    pub fn run(mut self) -> BatchReport {
        let started = Instant::now();
        log_op_start!(
            "import_batch",
            item_count = self.documents.len(),
            no_save = self.options.no_save
        );

        self.first_pass();
        if self.state == BatchState::Pass1Applied {
            self.second_pass();
        }
        let report = self.into_report();

        log_op_end!(
            "import_batch",
            duration_ms = started.elapsed().as_millis() as u64,
            state = ?report.state,
            change_count = report.change_count(),
            failure_count = report.failures().count()
        );
        report
    }

    /// Document indexes grouped by kind, kinds in priority order, input order
    /// within a kind; documents of unregistered kinds come last
    fn processing_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.documents.len()).collect();
        order.sort_by_key(|&index| {
            let kind = self.documents[index].kind;
            let rank = if self.registry.contains(kind) {
                kind.priority()
            } else {
                u32::MAX
            };
            (rank, index)
        });
        order
    }

    pub fn first_pass(&mut self) -> BatchState {
        if self.state != BatchState::Pending {
            tracing::warn!(state = ?self.state, "first pass requested out of order");
            return self.state;
        }

        for index in self.processing_order() {
            if self.cancel.is_cancelled() {
                tracing::info!(index, "import cancelled during first pass");
                self.state = BatchState::Pass1Failed;
                return self.state;
            }
            let outcome = self.first_pass_one(index);
            self.outcomes[index] = Some(outcome);
        }

        self.state = BatchState::Pass1Applied;
        self.state
    }

    fn first_pass_one(&mut self, index: usize) -> ItemOutcome {
        let doc = &self.documents[index];
        let options = self.options;

        let admitted = match self.registry.settings(doc.kind) {
            Some(settings) => should_import(doc, settings),
            None => true,
        };
        if !admitted {
            return ItemOutcome::Filtered;
        }

        let Some(handler) = self.registry.handler_mut(doc.kind) else {
            let err = SyncError::Internal {
                message: format!("no handler registered for {}", doc.kind),
            };
            return ItemOutcome::Applied {
                first: SyncAttempt::fail_with(doc.alias(), ChangeType::Import, err),
                second: None,
            };
        };

        let mut first = handler.first_pass(index, doc, &options, &self.staged);
        let wants_save = matches!(first.change_type(), ChangeType::Create | ChangeType::Update);
        if first.is_success() && wants_save && !options.no_save {
            if let Err(err) = handler.save_pending(index) {
                first = SyncAttempt::fail_with(doc.alias(), first.change_type(), err);
            }
        }
        if let Some(message) = first.message() {
            tracing::warn!(kind = %doc.kind, alias = %doc.alias(), error = message, "document failed first pass");
        }
        if doc.action != SyncAction::Delete {
            if let Some(summary) = first.item() {
                self.staged.insert(summary.kind, &summary.alias);
            }
        }
        ItemOutcome::Applied { first, second: None }
    }

    pub fn second_pass(&mut self) -> BatchState {
        if self.state != BatchState::Pass1Applied {
            tracing::warn!(state = ?self.state, "second pass requested out of order");
            return self.state;
        }

        for index in self.processing_order() {
            if self.cancel.is_cancelled() {
                tracing::info!(index, "import cancelled during second pass");
                return self.state;
            }
            let doc = &self.documents[index];
            let Some(ItemOutcome::Applied { first, second }) = self.outcomes[index].as_mut() else {
                continue;
            };
            if !first.is_success() {
                continue;
            }
            let Some(handler) = self.registry.handler_mut(doc.kind) else {
                continue;
            };
            *second = handler.second_pass(index, doc, &self.options);
            if let Some(message) = second.as_ref().and_then(|s| s.message()) {
                tracing::warn!(kind = %doc.kind, alias = %doc.alias(), error = message, "document failed second pass");
            }
        }

        self.registry.reset();
        self.state = BatchState::Pass2Applied;
        self.state
    }

    pub fn into_report(self) -> BatchReport {
        self.registry.reset();
        let items = self
            .documents
            .iter()
            .zip(self.outcomes)
            .enumerate()
            .map(|(index, (doc, outcome))| ItemReport {
                index,
                kind: doc.kind,
                alias: doc.alias().to_string(),
                outcome: outcome.unwrap_or(ItemOutcome::Cancelled),
            })
            .collect();
        BatchReport {
            state: self.state,
            items,
        }
    }
}
