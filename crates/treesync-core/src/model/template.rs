use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityId, EntityKind, SyncEntity};

/// A rendering template backed by a view file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Option<EntityId>,
    pub key: Uuid,
    pub alias: String,
    pub name: String,
    /// Alias of the master (layout) template
    pub master_alias: Option<String>,
    /// View source; read from the backing file when the template is created
    pub content: String,
}

impl Template {
    pub fn new(key: Uuid, alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            key,
            alias: alias.into(),
            name: name.into(),
            master_alias: None,
            content: String::new(),
        }
    }

    /// Relative path of the backing view file
    pub fn view_path(&self) -> String {
        format!("{}.cshtml", self.alias)
    }
}

impl SyncEntity for Template {
    const KIND: EntityKind = EntityKind::Template;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn key(&self) -> Uuid {
        self.key
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn name(&self) -> &str {
        &self.name
    }
}
