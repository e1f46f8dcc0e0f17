//! Static kind-to-handler mapping, built once at startup

use std::collections::BTreeMap;

use super::handler::{KindHandler, SerializerHandler};
use crate::model::EntityKind;
use crate::policy::HandlerSettings;
use crate::serializer::{ContentSerializer, ContentTypeSerializer, MemberTypeSerializer, TemplateSerializer};
use crate::store::SiteStore;

struct Registered {
    handler: Box<dyn KindHandler>,
    settings: HandlerSettings,
}

/// The handlers taking part in import and export, one per kind
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<EntityKind, Registered>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for every built-in kind over one shared store
    pub fn standard<S: SiteStore>(store: S) -> Self {
        let mut registry = Self::new();
        registry.register(
            Box::new(SerializerHandler::new(TemplateSerializer::new(store.clone()))),
            HandlerSettings::new(),
        );
        registry.register(
            Box::new(SerializerHandler::new(ContentTypeSerializer::new(store.clone()))),
            HandlerSettings::new(),
        );
        registry.register(
            Box::new(SerializerHandler::new(MemberTypeSerializer::new(store.clone()))),
            HandlerSettings::new(),
        );
        registry.register(
            Box::new(SerializerHandler::new(ContentSerializer::new(store))),
            HandlerSettings::new(),
        );
        registry
    }

    /// Add a handler, replacing any previous one for the same kind
    pub fn register(&mut self, handler: Box<dyn KindHandler>, settings: HandlerSettings) {
        let kind = handler.kind();
        tracing::debug!(kind = %kind, "registering handler");
        self.handlers.insert(kind, Registered { handler, settings });
    }

    /// Take a kind out of import and export
    pub fn disable(&mut self, kind: EntityKind) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    /// Replace the settings of a registered kind
    pub fn configure(&mut self, kind: EntityKind, settings: HandlerSettings) -> bool {
        match self.handlers.get_mut(&kind) {
            Some(registered) => {
                registered.settings = settings;
                true
            }
            None => false,
        }
    }

    /// Registered kinds, lowest priority value first
    pub fn kinds(&self) -> Vec<EntityKind> {
        let mut kinds: Vec<EntityKind> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|kind| kind.priority());
        kinds
    }

    pub fn handler(&self, kind: EntityKind) -> Option<&dyn KindHandler> {
        self.handlers.get(&kind).map(|r| r.handler.as_ref())
    }

    pub fn handler_mut(&mut self, kind: EntityKind) -> Option<&mut (dyn KindHandler + 'static)> {
        self.handlers.get_mut(&kind).map(|r| r.handler.as_mut())
    }

    pub fn settings(&self, kind: EntityKind) -> Option<&HandlerSettings> {
        self.handlers.get(&kind).map(|r| &r.settings)
    }

    pub fn contains(&self, kind: EntityKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Drop pass-1 state held by every handler
    pub fn reset(&mut self) {
        for registered in self.handlers.values_mut() {
            registered.handler.reset();
        }
    }
}
