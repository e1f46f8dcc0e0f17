//! Canonical ordering, validation, encoding and digests for documents
//!
//! ## Determinism Guarantees
//!
//! - `canonicalize` is idempotent: applying it twice equals applying it once
//! - equal canonical documents encode to byte-identical JSON
//! - the digest is the SHA256 of that encoding, so it is stable as well
//!
//! Formatting noise (CRLF line endings, trailing whitespace, section order)
//! is removed here, before any comparison, so it can never show up as a
//! change.

use serde_json::error::Category;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use super::{Document, PropertyEntry, SyncAction};
use crate::errors::{Result, SyncError};
use crate::model::EntityKind;

impl Document {
    /// Sort every section into canonical order and normalize text
    pub fn canonicalize(&mut self) {
        let info = &mut self.info;
        info.alias = info.alias.trim().to_string();
        normalize_text(&mut info.name);
        for text in [
            &mut info.folder,
            &mut info.path,
            &mut info.icon,
            &mut info.description,
            &mut info.content_type,
            &mut info.template,
        ]
        .into_iter()
        .flatten()
        {
            normalize_text(text);
        }
        if let Some(parent) = info.parent.as_mut() {
            parent.alias = parent.alias.trim().to_string();
        }

        for entry in self.properties.iter_mut() {
            match entry {
                PropertyEntry::Definition(def) => {
                    normalize_text(&mut def.name);
                    for text in [&mut def.validation, &mut def.description, &mut def.tab]
                        .into_iter()
                        .flatten()
                    {
                        normalize_text(text);
                    }
                }
                PropertyEntry::Value(value) => normalize_value(&mut value.value),
            }
        }

        self.properties.sort_by(|a, b| match (a, b) {
            (PropertyEntry::Definition(x), PropertyEntry::Definition(y)) => x
                .sort_order
                .cmp(&y.sort_order)
                .then_with(|| x.alias.to_lowercase().cmp(&y.alias.to_lowercase())),
            _ => a.alias().to_lowercase().cmp(&b.alias().to_lowercase()),
        });
        self.compositions
            .sort_by_key(|r| r.alias.to_lowercase());
        self.structure.sort_by_key(|r| r.alias.to_lowercase());
        self.tabs
            .sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
    }

    /// Owned variant of [`Document::canonicalize`]
    pub fn into_canonical(mut self) -> Self {
        self.canonicalize();
        self
    }

    /// Check the fields every import relies on
    ///
    /// # Errors
    ///
    /// `MissingField` when the key, alias or name is absent, `InvalidDocument`
    /// when the properties section is inconsistent with the kind.
    pub fn validate(&self) -> Result<()> {
        let alias = self.info.alias.trim();
        let label = if alias.is_empty() {
            self.info.key.to_string()
        } else {
            alias.to_string()
        };
        let missing = |field: &str| SyncError::MissingField {
            alias: label.clone(),
            field: field.to_string(),
        };

        if alias.is_empty() {
            return Err(missing("info.alias"));
        }
        if self.info.key.is_nil() {
            return Err(missing("info.key"));
        }
        if self.action == SyncAction::Delete {
            return Ok(());
        }
        if self.info.name.trim().is_empty() {
            return Err(missing("info.name"));
        }

        let mut seen = HashSet::new();
        for entry in &self.properties {
            let prop_alias = entry.alias().trim();
            if prop_alias.is_empty() {
                return Err(SyncError::InvalidDocument {
                    alias: label,
                    reason: "property with an empty alias".to_string(),
                });
            }
            if !seen.insert(prop_alias.to_lowercase()) {
                return Err(SyncError::InvalidDocument {
                    alias: label,
                    reason: format!("duplicate property alias '{}'", prop_alias),
                });
            }
            let expects_values = self.kind == EntityKind::Content;
            let is_value = matches!(entry, PropertyEntry::Value(_));
            if expects_values != is_value {
                return Err(SyncError::InvalidDocument {
                    alias: label,
                    reason: format!(
                        "property '{}' is not valid for a {} document",
                        prop_alias, self.kind
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Encode a document in canonical form: sorted, pretty-printed, newline
/// terminated.
///
/// # Errors
///
/// Returns `SyncError::Serialization` if JSON encoding fails.
pub fn to_canonical_json(doc: &Document) -> Result<String> {
    let canonical = doc.clone().into_canonical();
    let mut json = serde_json::to_string_pretty(&canonical)?;
    json.push('\n');
    Ok(json)
}

/// Decode a document, classifying failures
///
/// # Errors
///
/// `InvalidDocument` when the JSON is well-formed but does not match the
/// document shape (for example a missing `info` section), `Serialization`
/// when the text is not JSON at all.
pub fn from_json(text: &str) -> Result<Document> {
    serde_json::from_str::<Document>(text).map_err(|e| match e.classify() {
        Category::Data => SyncError::InvalidDocument {
            alias: String::new(),
            reason: e.to_string(),
        },
        _ => SyncError::from(e),
    })
}

/// SHA256 over the canonical encoding, hex encoded
///
/// # Errors
///
/// Returns `SyncError::Serialization` if JSON encoding fails.
pub fn document_digest(doc: &Document) -> Result<String> {
    let json = to_canonical_json(doc)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Text as it appears in a canonical document
pub fn normalized_text(text: &str) -> String {
    let mut out = text.to_string();
    normalize_text(&mut out);
    out
}

/// Property value as it appears in a canonical document
pub fn normalized_value(value: &serde_json::Value) -> serde_json::Value {
    let mut out = value.clone();
    normalize_value(&mut out);
    out
}

fn normalize_text(text: &mut String) {
    if text.contains('\r') {
        *text = text.replace("\r\n", "\n");
    }
    let trimmed = text.trim_end().len();
    text.truncate(trimmed);
}

fn normalize_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => normalize_text(s),
        serde_json::Value::Array(items) => items.iter_mut().for_each(normalize_value),
        serde_json::Value::Object(map) => map.values_mut().for_each(normalize_value),
        _ => {}
    }
}
