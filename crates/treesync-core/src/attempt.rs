//! Attempt/result envelope shared by every serializer, import and export
//! operation
//!
//! Orchestration code aggregates [`SyncAttempt`]s without knowing which
//! entity kind produced them.

use serde::Serialize;
use std::fmt;

use crate::document::normalized_text;
use crate::errors::{ExError, SyncError};

/// What an operation did (or, in no-save mode, would do) to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    Export,
    Import,
    NoChange,
}

impl ChangeType {
    /// Outcome tag for a deserialize step
    pub fn from_changes(is_new: bool, changes: &[ChangeRecord]) -> Self {
        if is_new {
            ChangeType::Create
        } else if changes.is_empty() {
            ChangeType::NoChange
        } else {
            ChangeType::Update
        }
    }
}

/// Category of one field-level change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    New,
    Update,
    Delete,
    /// Reported explicitly even though nothing changed
    NoChange,
}

/// One semantic difference between incoming and current state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    /// Field name
    pub name: String,
    /// Locator for reports, e.g. `heading/Mandatory`
    pub path: String,
    pub change: ChangeKind,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl ChangeRecord {
    pub fn update(
        name: impl Into<String>,
        path: impl Into<String>,
        old_value: impl fmt::Display,
        new_value: impl fmt::Display,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            change: ChangeKind::Update,
            old_value: Some(old_value.to_string()),
            new_value: Some(new_value.to_string()),
        }
    }

    pub fn added(name: impl Into<String>, path: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            change: ChangeKind::New,
            old_value: None,
            new_value: Some(value.to_string()),
        }
    }

    pub fn removed(name: impl Into<String>, path: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            change: ChangeKind::Delete,
            old_value: Some(value.to_string()),
            new_value: None,
        }
    }

    pub fn no_change(name: impl Into<String>, path: impl Into<String>, note: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            change: ChangeKind::NoChange,
            old_value: None,
            new_value: Some(note.to_string()),
        }
    }
}

/// Ordered list of change records built up while applying a document
///
/// The `track_*` helpers compare, record and assign in one step, so a record
/// always accompanies the mutation it describes.
#[derive(Debug, Default)]
pub struct ChangeLog {
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ChangeRecord>) {
        self.records.extend(records);
    }

    /// Assign `incoming` to `target` when they differ, recording an update
    pub fn track<T>(&mut self, name: &str, path: &str, target: &mut T, incoming: T) -> bool
    where
        T: PartialEq + fmt::Display,
    {
        if *target == incoming {
            return false;
        }
        self.records
            .push(ChangeRecord::update(name, path, &*target, &incoming));
        *target = incoming;
        true
    }

    /// Like [`ChangeLog::track`] for optional values; `None` renders empty
    pub fn track_opt<T>(
        &mut self,
        name: &str,
        path: &str,
        target: &mut Option<T>,
        incoming: Option<T>,
    ) -> bool
    where
        T: PartialEq + fmt::Display,
    {
        if *target == incoming {
            return false;
        }
        let render = |v: &Option<T>| v.as_ref().map(|x| x.to_string()).unwrap_or_default();
        self.records.push(ChangeRecord::update(
            name,
            path,
            render(target),
            render(&incoming),
        ));
        *target = incoming;
        true
    }

    /// Text variant of [`ChangeLog::track`]
    ///
    /// Values that only differ by formatting noise compare equal and the
    /// live text is left untouched.
    pub fn track_text(&mut self, name: &str, path: &str, target: &mut String, incoming: String) -> bool {
        if normalized_text(target) == incoming {
            return false;
        }
        self.track(name, path, target, incoming)
    }

    /// Text variant of [`ChangeLog::track_opt`]
    pub fn track_text_opt(
        &mut self,
        name: &str,
        path: &str,
        target: &mut Option<String>,
        incoming: Option<String>,
    ) -> bool {
        if target.as_deref().map(normalized_text) == incoming {
            return false;
        }
        self.track_opt(name, path, target, incoming)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<ChangeRecord> {
        self.records
    }
}

/// Tagged outcome of one operation on one entity
#[derive(Debug, Clone)]
pub enum SyncAttempt<T> {
    Success {
        name: String,
        item: T,
        change_type: ChangeType,
        changes: Vec<ChangeRecord>,
    },
    Fail {
        name: String,
        change_type: ChangeType,
        message: String,
        cause: Option<ExError>,
    },
}

impl<T> SyncAttempt<T> {
    pub fn succeed(
        name: impl Into<String>,
        item: T,
        change_type: ChangeType,
        changes: Vec<ChangeRecord>,
    ) -> Self {
        SyncAttempt::Success {
            name: name.into(),
            item,
            change_type,
            changes,
        }
    }

    pub fn fail(name: impl Into<String>, change_type: ChangeType, message: impl Into<String>) -> Self {
        SyncAttempt::Fail {
            name: name.into(),
            change_type,
            message: message.into(),
            cause: None,
        }
    }

    /// Failure carrying the structured cause; the message is the error's
    /// display text
    pub fn fail_with(name: impl Into<String>, change_type: ChangeType, err: SyncError) -> Self {
        SyncAttempt::Fail {
            name: name.into(),
            change_type,
            message: err.to_string(),
            cause: Some(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncAttempt::Success { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            SyncAttempt::Success { name, .. } | SyncAttempt::Fail { name, .. } => name,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            SyncAttempt::Success { change_type, .. } | SyncAttempt::Fail { change_type, .. } => {
                *change_type
            }
        }
    }

    /// Change records; empty for failures
    pub fn changes(&self) -> &[ChangeRecord] {
        match self {
            SyncAttempt::Success { changes, .. } => changes,
            SyncAttempt::Fail { .. } => &[],
        }
    }

    pub fn item(&self) -> Option<&T> {
        match self {
            SyncAttempt::Success { item, .. } => Some(item),
            SyncAttempt::Fail { .. } => None,
        }
    }

    pub fn into_item(self) -> Option<T> {
        match self {
            SyncAttempt::Success { item, .. } => Some(item),
            SyncAttempt::Fail { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            SyncAttempt::Fail { message, .. } => Some(message),
            SyncAttempt::Success { .. } => None,
        }
    }

    pub fn cause(&self) -> Option<&ExError> {
        match self {
            SyncAttempt::Fail { cause, .. } => cause.as_ref(),
            SyncAttempt::Success { .. } => None,
        }
    }

    /// Transform the payload, keeping tag and changes
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SyncAttempt<U> {
        match self {
            SyncAttempt::Success {
                name,
                item,
                change_type,
                changes,
            } => SyncAttempt::Success {
                name,
                item: f(item),
                change_type,
                changes,
            },
            SyncAttempt::Fail {
                name,
                change_type,
                message,
                cause,
            } => SyncAttempt::Fail {
                name,
                change_type,
                message,
                cause,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    #[test]
    fn test_track_records_only_differences() {
        let mut log = ChangeLog::new();
        let mut name = "Home".to_string();

        assert!(!log.track("Name", "Info/Name", &mut name, "Home".to_string()));
        assert!(log.track("Name", "Info/Name", &mut name, "Start".to_string()));

        let records = log.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].old_value.as_deref(), Some("Home"));
        assert_eq!(records[0].new_value.as_deref(), Some("Start"));
        assert_eq!(name, "Start");
    }

    #[test]
    fn test_track_opt_renders_none_as_empty() {
        let mut log = ChangeLog::new();
        let mut icon: Option<String> = None;
        log.track_opt("Icon", "Info/Icon", &mut icon, Some("icon-home".to_string()));
        let records = log.into_records();
        assert_eq!(records[0].old_value.as_deref(), Some(""));
    }

    #[test]
    fn test_change_type_from_changes() {
        assert_eq!(ChangeType::from_changes(true, &[]), ChangeType::Create);
        assert_eq!(ChangeType::from_changes(false, &[]), ChangeType::NoChange);
        let change = ChangeRecord::added("x", "x", "1");
        assert_eq!(ChangeType::from_changes(false, &[change]), ChangeType::Update);
    }

    #[test]
    fn test_fail_with_keeps_structured_cause() {
        let attempt: SyncAttempt<()> = SyncAttempt::fail_with(
            "home",
            ChangeType::Import,
            SyncError::store("save", "locked"),
        );
        assert!(!attempt.is_success());
        assert!(attempt.changes().is_empty());
        assert_eq!(
            attempt.cause().map(|c| c.kind()),
            Some(ExErrorKind::StoreFailure)
        );
        assert_eq!(attempt.message(), Some("Store save failed: locked"));
    }
}
