//! Resolved character identity.

use super::world::{FactionId, WorldId};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Snapshot of a character as returned by the identity source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CompactString,
    pub name: CompactString,
    pub faction: FactionId,
    pub world: Option<WorldId>,
    pub outfit: Option<OutfitRef>,
}

/// The outfit a character belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutfitRef {
    pub id: CompactString,
    #[serde(default)]
    pub tag: CompactString,
    #[serde(default)]
    pub name: CompactString,
}

impl Character {
    pub fn outfit_id(&self) -> Option<&CompactString> {
        self.outfit.as_ref().map(|outfit| &outfit.id)
    }
}
