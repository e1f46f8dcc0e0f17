use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of synced entity, each with its own serializer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Template,
    ContentType,
    MemberType,
    Content,
}

impl EntityKind {
    /// Every kind, in handler priority order
    ///
    /// Templates come first because content types and content reference
    /// them; content comes last because it references everything else.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Template,
        EntityKind::ContentType,
        EntityKind::MemberType,
        EntityKind::Content,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Template => "template",
            EntityKind::ContentType => "content_type",
            EntityKind::MemberType => "member_type",
            EntityKind::Content => "content",
        }
    }

    /// Folder name used for this kind's documents on disk
    pub fn folder_name(&self) -> &'static str {
        match self {
            EntityKind::Template => "Templates",
            EntityKind::ContentType => "ContentTypes",
            EntityKind::MemberType => "MemberTypes",
            EntityKind::Content => "Content",
        }
    }

    /// Lower runs first
    pub fn priority(&self) -> u32 {
        match self {
            EntityKind::Template => 10,
            EntityKind::ContentType => 20,
            EntityKind::MemberType => 30,
            EntityKind::Content => 100,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown entity kind '{}'", s))
    }
}
