//! Canonical document folder
//!
//! Documents live at `<root>/<kind folder>/<stem>.json`, one entity per file,
//! encoded with [`to_canonical_json`]. Writes go through [`atomic_write`] and
//! are skipped when the file already holds the same bytes, so an export of an
//! unchanged site touches nothing on disk.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use treesync_core::document::{from_json, to_canonical_json};
use treesync_core::{Document, EntityKind};

use crate::atomic::atomic_write;
use crate::errors::{document_encode_error, document_parse_error, io_error_at, Result};
use crate::naming::DOCUMENT_EXTENSION;

/// A document read back from the folder
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub path: PathBuf,
    /// File name without the extension
    pub stem: String,
    pub document: Document,
}

/// What a write did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    /// SHA256 of the canonical bytes
    pub digest: String,
    /// False when the file already held these bytes
    pub changed: bool,
}

/// File-backed store of canonical documents
#[derive(Debug, Clone)]
pub struct DocumentFolder {
    root: PathBuf,
}

impl DocumentFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(kind.folder_name())
    }

    pub fn path_for(&self, kind: EntityKind, stem: &str) -> PathBuf {
        self.kind_dir(kind)
            .join(format!("{}.{}", stem, DOCUMENT_EXTENSION))
    }

    /// Write `doc` as `<stem>.json`, skipping the write when the digest of
    /// the file on disk already matches
    ///
    /// # Errors
    ///
    /// `Serialization` if the document cannot be encoded, `Io` if the file
    /// cannot be read or written.
    pub fn write(&self, kind: EntityKind, stem: &str, doc: &Document) -> Result<WrittenFile> {
        let path = self.path_for(kind, stem);
        let json = to_canonical_json(doc).map_err(|e| document_encode_error(&path, e))?;
        let digest = content_digest(json.as_bytes());

        match fs::read(&path) {
            Ok(existing) if content_digest(&existing) == digest => {
                tracing::debug!(path = %path.display(), "document unchanged");
                return Ok(WrittenFile {
                    path,
                    digest,
                    changed: false,
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error_at("read_document", &path, e)),
        }

        atomic_write(&path, json.as_bytes())?;
        tracing::debug!(path = %path.display(), digest = %digest, "document written");

        Ok(WrittenFile {
            path,
            digest,
            changed: true,
        })
    }

    /// Read one document by stem; `None` when there is no such file
    ///
    /// # Errors
    ///
    /// `Io` on read failure, or the document's own classification when the
    /// file does not decode.
    pub fn read(&self, kind: EntityKind, stem: &str) -> Result<Option<StoredDocument>> {
        let path = self.path_for(kind, stem);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let document = from_json(&text).map_err(|e| document_parse_error(&path, e))?;
                Ok(Some(StoredDocument {
                    path,
                    stem: stem.to_string(),
                    document,
                }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error_at("read_document", &path, e)),
        }
    }

    /// Every document of the kind, ordered by file name
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be read or decoded.
    pub fn read_all(&self, kind: EntityKind) -> Result<Vec<StoredDocument>> {
        self.document_paths(kind)?
            .into_iter()
            .map(|path| {
                let text = fs::read_to_string(&path).map_err(|e| io_error_at("read_document", &path, e))?;
                let document = from_json(&text).map_err(|e| document_parse_error(&path, e))?;
                Ok(StoredDocument {
                    stem: stem_of(&path),
                    path,
                    document,
                })
            })
            .collect()
    }

    /// Like [`read_all`](Self::read_all), but files that do not decode are
    /// logged and left out
    ///
    /// # Errors
    ///
    /// Only when the kind folder itself cannot be listed.
    pub fn scan(&self, kind: EntityKind) -> Result<Vec<StoredDocument>> {
        let mut documents = Vec::new();
        for path in self.document_paths(kind)? {
            let parsed = fs::read_to_string(&path)
                .map_err(|e| io_error_at("read_document", &path, e))
                .and_then(|text| from_json(&text).map_err(|e| document_parse_error(&path, e)));
            match parsed {
                Ok(document) => documents.push(StoredDocument {
                    stem: stem_of(&path),
                    path,
                    document,
                }),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        Ok(documents)
    }

    /// The stored document carrying `key`, if any
    ///
    /// # Errors
    ///
    /// Only when the kind folder itself cannot be listed.
    pub fn find_by_key(&self, kind: EntityKind, key: Uuid) -> Result<Option<StoredDocument>> {
        Ok(self
            .scan(kind)?
            .into_iter()
            .find(|stored| stored.document.key() == key))
    }

    /// Delete `<stem>.json`; false when it did not exist
    ///
    /// # Errors
    ///
    /// `Io` if the file exists but cannot be removed.
    pub fn remove(&self, kind: EntityKind, stem: &str) -> Result<bool> {
        let path = self.path_for(kind, stem);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "document removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error_at("remove_document", &path, e)),
        }
    }

    fn document_paths(&self, kind: EntityKind) -> Result<Vec<PathBuf>> {
        let dir = self.kind_dir(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error_at("list_documents", &dir, e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error_at("list_documents", &dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// SHA256 of raw file bytes, hex encoded
pub fn content_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use treesync_core::document::{document_digest, Info};

    fn template(alias: &str) -> Document {
        Document::new(
            EntityKind::Template,
            Info::new(Uuid::new_v4(), alias, alias.to_uppercase()),
        )
    }

    #[test]
    fn test_second_identical_write_is_skipped() {
        let dir = TempDir::new().unwrap();
        let folder = DocumentFolder::new(dir.path());
        let doc = template("master");

        let first = folder.write(EntityKind::Template, "master", &doc).unwrap();
        let second = folder.write(EntityKind::Template, "master", &doc).unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.digest, document_digest(&doc).unwrap());
    }

    #[test]
    fn test_missing_folder_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let folder = DocumentFolder::new(dir.path().join("nowhere"));

        assert!(folder.read_all(EntityKind::Content).unwrap().is_empty());
        assert!(folder.read(EntityKind::Content, "home").unwrap().is_none());
        assert!(!folder.remove(EntityKind::Content, "home").unwrap());
    }

    #[test]
    fn test_stem_of_strips_extension() {
        assert_eq!(stem_of(Path::new("/a/Templates/master.json")), "master");
    }
}
