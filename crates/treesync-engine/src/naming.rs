//! Choosing the file each exported document goes to
//!
//! Templates and types are filed under their alias, content under its name.
//! Two different items can want the same file (two pages called "News" at
//! different levels). The match string tells them apart: an item takes over
//! a file whose owner has the same match string, and otherwise gets its key
//! appended to the name.

use std::collections::HashMap;
use uuid::Uuid;

use treesync_core::{Document, EntityKind};
use treesync_store::{safe_file_name, StoredDocument};

/// Identity of a document for clash detection
///
/// Content uses `name_level`, or `name_path` when trashed; every other kind
/// uses its alias. Always lowercase.
pub fn match_string(doc: &Document) -> String {
    let text = match doc.kind {
        EntityKind::Content => {
            let position = if doc.info.trashed {
                doc.info.path.clone().unwrap_or_default()
            } else {
                doc.info.level.to_string()
            };
            format!("{}_{}", doc.info.name, position)
        }
        _ => doc.info.alias.clone(),
    };
    text.to_lowercase()
}

fn base_name(doc: &Document) -> String {
    match doc.kind {
        EntityKind::Content => safe_file_name(&doc.info.name),
        _ => safe_file_name(&doc.info.alias),
    }
}

/// Where a document should be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAssignment {
    pub stem: String,
    /// Earlier file of the same entity that is now superseded
    pub replaces: Option<String>,
}

#[derive(Debug, Clone)]
struct Claim {
    key: Uuid,
    match_string: String,
}

/// File stem allocation for one kind folder
#[derive(Debug, Clone)]
pub struct FileNamer {
    use_guid: bool,
    owners: HashMap<String, Claim>,
    by_key: HashMap<Uuid, String>,
}

impl FileNamer {
    /// Seed the allocator with what is already on disk
    pub fn new(use_guid: bool, existing: Vec<StoredDocument>) -> Self {
        let mut namer = Self {
            use_guid,
            owners: HashMap::new(),
            by_key: HashMap::new(),
        };
        for stored in existing {
            let key = stored.document.key();
            namer.owners.insert(
                stored.stem.clone(),
                Claim {
                    key,
                    match_string: match_string(&stored.document),
                },
            );
            namer.by_key.entry(key).or_insert(stored.stem);
        }
        namer
    }

    pub fn assign(&mut self, doc: &Document) -> FileAssignment {
        let key = doc.key();
        let matcher = match_string(doc);

        let stem = if self.use_guid {
            key.to_string()
        } else {
            let base = base_name(doc);
            match self.owners.get(&base) {
                Some(owner) if owner.key != key && owner.match_string != matcher => {
                    tracing::debug!(file = %base, key = %key, "file name clash, appending key");
                    format!("{}_{}", base, key.simple())
                }
                _ => base,
            }
        };

        let replaces = self
            .by_key
            .get(&key)
            .filter(|previous| **previous != stem)
            .filter(|previous| self.owners.get(*previous).is_some_and(|owner| owner.key == key))
            .cloned();

        if let Some(previous) = &replaces {
            self.owners.remove(previous);
        }
        self.owners.insert(
            stem.clone(),
            Claim {
                key,
                match_string: matcher,
            },
        );
        self.by_key.insert(key, stem.clone());

        FileAssignment { stem, replaces }
    }
}
