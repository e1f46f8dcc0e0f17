//! Import/export admission policy
//!
//! Pure predicates over a document and the per-handler settings bag. The
//! checks run in a fixed order and the first failing one decides:
//!
//! 1. trashed state (`ImportTrashed` / `ExportTrashed`, both default true)
//! 2. include prefixes (`Include`)
//! 3. exclude prefixes (`Exclude`)
//!
//! Export only applies 2 and 3 when `RulesOnExport` is set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::Document;

pub const IMPORT_TRASHED: &str = "ImportTrashed";
pub const EXPORT_TRASHED: &str = "ExportTrashed";
pub const INCLUDE: &str = "Include";
pub const EXCLUDE: &str = "Exclude";
pub const RULES_ON_EXPORT: &str = "RulesOnExport";
pub const USE_GUID_FILENAMES: &str = "UseGuidFilenames";
pub const DELETE_EMPTY_FOLDERS: &str = "DeleteEmptyFolders";

/// Flat option bag for one handler kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerSettings {
    values: BTreeMap<String, String>,
}

impl HandlerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `"true"` (any case) is true, any other value false, absence the default
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => value.trim().eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// Comma-separated list; empty entries are dropped
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl FromIterator<(String, String)> for HandlerSettings {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Should this document be applied to the store?
pub fn should_import(doc: &Document, settings: &HandlerSettings) -> bool {
    if doc.info.trashed && !settings.get_bool(IMPORT_TRASHED, true) {
        tracing::debug!(alias = %doc.info.alias, "skipping trashed item");
        return false;
    }

    let path = doc.info.path.as_deref().unwrap_or_default().trim();
    if path.is_empty() {
        return true;
    }

    let include = settings.get_list(INCLUDE);
    if !include.is_empty() && !include.iter().any(|prefix| starts_with_ci(path, prefix)) {
        tracing::debug!(alias = %doc.info.alias, path, "path not in include list");
        return false;
    }

    let exclude = settings.get_list(EXCLUDE);
    if exclude.iter().any(|prefix| starts_with_ci(path, prefix)) {
        tracing::debug!(alias = %doc.info.alias, path, "path excluded");
        return false;
    }

    true
}

/// Should this freshly serialized document be written out?
pub fn should_export(doc: &Document, settings: &HandlerSettings) -> bool {
    if doc.info.trashed && !settings.get_bool(EXPORT_TRASHED, true) {
        return false;
    }
    if settings.get_bool(RULES_ON_EXPORT, false) {
        return should_import(doc, settings);
    }
    true
}

fn starts_with_ci(path: &str, prefix: &str) -> bool {
    path.to_lowercase().starts_with(&prefix.to_lowercase())
}
