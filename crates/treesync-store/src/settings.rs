//! Sync settings loaded from YAML
//!
//! ```yaml
//! root: usync
//! views: views
//! handlers:
//!   content:
//!     enabled: true
//!     settings: { Include: "/Home", ImportTrashed: "false" }
//!   member_type:
//!     enabled: false
//! ```
//!
//! Handler names are entity kind names. A kind that is not listed is enabled
//! with empty settings. Relative paths are resolved against the directory of
//! the settings file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use treesync_core::{EntityKind, HandlerSettings};

use crate::errors::{io_error_at, settings_error, Result};

/// Configuration of one handler kind
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HandlerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: HandlerSettings,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: HandlerSettings::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    root: PathBuf,
    #[serde(default)]
    views: Option<PathBuf>,
    #[serde(default)]
    handlers: BTreeMap<String, HandlerConfig>,
}

/// Validated settings
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Folder holding the document tree
    pub root: PathBuf,
    /// Folder holding template view files, if views come from disk
    pub views: Option<PathBuf>,
    handlers: BTreeMap<EntityKind, HandlerConfig>,
}

impl SyncSettings {
    /// Settings with every handler enabled and unconfigured
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            views: None,
            handlers: BTreeMap::new(),
        }
    }

    /// Load and validate a settings file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `InvalidInput` if it is not valid
    /// settings YAML or names an unknown handler.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| io_error_at("load_settings", path, e))?;
        let mut settings = Self::from_yaml_str(&text)?;

        if let Some(base) = path.parent() {
            settings.root = base.join(&settings.root);
            settings.views = settings.views.map(|views| base.join(views));
        }
        Ok(settings)
    }

    /// Parse settings YAML without touching the filesystem
    ///
    /// # Errors
    ///
    /// `InvalidInput` on malformed YAML, unknown fields or unknown handler
    /// names.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: RawSettings =
            serde_yaml::from_str(text).map_err(|e| settings_error(&format!("YAML parse error: {}", e)))?;

        if raw.root.as_os_str().is_empty() {
            return Err(settings_error("root must not be empty"));
        }

        let mut handlers = BTreeMap::new();
        for (name, config) in raw.handlers {
            let kind: EntityKind = name
                .parse()
                .map_err(|e: String| settings_error(&format!("Unknown handler '{}': {}", name, e)))?;
            if handlers.insert(kind, config).is_some() {
                return Err(settings_error(&format!("Handler '{}' is configured twice", name)));
            }
        }

        Ok(Self {
            root: raw.root,
            views: raw.views,
            handlers,
        })
    }

    pub fn with_handler(mut self, kind: EntityKind, config: HandlerConfig) -> Self {
        self.handlers.insert(kind, config);
        self
    }

    /// Configuration for `kind`, falling back to enabled and empty
    pub fn handler(&self, kind: EntityKind) -> HandlerConfig {
        self.handlers.get(&kind).cloned().unwrap_or_default()
    }

    pub fn is_enabled(&self, kind: EntityKind) -> bool {
        self.handlers.get(&kind).map_or(true, |config| config.enabled)
    }
}
