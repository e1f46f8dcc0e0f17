//! Registry and context construction from settings

use treesync_core::store::SiteStore;
use treesync_core::{EntityKind, HandlerRegistry};
use treesync_store::{DocumentFolder, SyncSettings};

/// Built-in handlers over `store`, with disabled kinds removed and each
/// remaining kind given its configured settings
pub fn build_registry<S: SiteStore>(store: S, settings: &SyncSettings) -> HandlerRegistry {
    let mut registry = HandlerRegistry::standard(store);
    for kind in EntityKind::ALL {
        let config = settings.handler(kind);
        if !config.enabled {
            registry.disable(kind);
            tracing::info!(kind = %kind, "handler disabled by settings");
            continue;
        }
        registry.configure(kind, config.settings);
    }
    registry
}

/// Everything an engine command works on
pub struct SyncContext<S> {
    pub store: S,
    pub registry: HandlerRegistry,
    pub folder: DocumentFolder,
}

impl<S: SiteStore> SyncContext<S> {
    pub fn new(store: S, settings: &SyncSettings) -> Self {
        Self {
            registry: build_registry(store.clone(), settings),
            folder: DocumentFolder::new(settings.root.clone()),
            store,
        }
    }
}
