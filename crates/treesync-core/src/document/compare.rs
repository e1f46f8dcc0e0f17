//! Structural comparison of two canonical documents
//!
//! Used for drift detection between a document on disk and a fresh export of
//! the live entity. Both sides are canonicalized first, so formatting noise
//! never produces records.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use super::{DocRef, Document, PropertyEntry};
use crate::attempt::ChangeRecord;

/// Ordered field-level differences between `old` and `new`
///
/// Order: info fields, then properties (in `new`'s canonical order, removed
/// ones last), then compositions, structure and tabs.
pub fn compare_documents(old: &Document, new: &Document) -> Vec<ChangeRecord> {
    let old = old.clone().into_canonical();
    let new = new.clone().into_canonical();
    let mut out = Vec::new();

    if old.action != new.action {
        out.push(ChangeRecord::update(
            "Action",
            "Action",
            format!("{:?}", old.action),
            format!("{:?}", new.action),
        ));
    }

    diff_values("Info", &to_value(&old.info), &to_value(&new.info), &mut out);
    diff_properties(&old.properties, &new.properties, &mut out);
    diff_refs("Compositions", &old.compositions, &new.compositions, &mut out);
    diff_refs("Structure", &old.structure, &new.structure, &mut out);

    let old_tabs: Vec<Value> = old.tabs.iter().map(to_value).collect();
    let new_tabs: Vec<Value> = new.tabs.iter().map(to_value).collect();
    if old_tabs != new_tabs {
        out.push(ChangeRecord::update(
            "Tabs",
            "Tabs",
            Value::Array(old_tabs),
            Value::Array(new_tabs),
        ));
    }
    out
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn diff_properties(old: &[PropertyEntry], new: &[PropertyEntry], out: &mut Vec<ChangeRecord>) {
    let find = |list: &'_ [PropertyEntry], alias: &str| {
        list.iter()
            .find(|p| p.alias().eq_ignore_ascii_case(alias))
            .map(to_value)
    };

    for entry in new {
        let alias = entry.alias();
        match find(old, alias) {
            Some(previous) => diff_values(alias, &previous, &to_value(entry), out),
            None => out.push(ChangeRecord::added(alias, alias, render(&to_value(entry)))),
        }
    }
    for entry in old {
        if find(new, entry.alias()).is_none() {
            out.push(ChangeRecord::removed(
                entry.alias(),
                entry.alias(),
                render(&to_value(entry)),
            ));
        }
    }
}

fn diff_refs(section: &str, old: &[DocRef], new: &[DocRef], out: &mut Vec<ChangeRecord>) {
    let aliases = |refs: &[DocRef]| -> BTreeSet<String> {
        refs.iter().map(|r| r.alias.to_lowercase()).collect()
    };
    let (old_set, new_set) = (aliases(old), aliases(new));
    for added in new_set.difference(&old_set) {
        out.push(ChangeRecord::added(section, format!("{}/{}", section, added), added));
    }
    for removed in old_set.difference(&new_set) {
        out.push(ChangeRecord::removed(section, format!("{}/{}", section, removed), removed));
    }
}

/// Recursive walk; objects are compared key by key, anything else as a whole
fn diff_values(path: &str, old: &Value, new: &Value, out: &mut Vec<ChangeRecord>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let child = format!("{}/{}", path, key);
                match (a.get(key), b.get(key)) {
                    (Some(x), Some(y)) => diff_values(&child, x, y, out),
                    (None, Some(y)) => out.push(ChangeRecord::added(key.as_str(), child, render(y))),
                    (Some(x), None) => out.push(ChangeRecord::removed(key.as_str(), child, render(x))),
                    (None, None) => {}
                }
            }
        }
        _ if old != new => {
            let name = path.rsplit('/').next().unwrap_or(path);
            out.push(ChangeRecord::update(name, path, render(old), render(new)));
        }
        _ => {}
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
