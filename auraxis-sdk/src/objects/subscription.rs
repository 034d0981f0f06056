//! Subscription commands sent to the streaming service.

use super::events::EventKind;
use super::world::WorldId;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Wildcard accepted by the service for both worlds and characters.
pub const ALL: &str = "all";

/// The declared subscription filter of one connection.
///
/// Re-sent verbatim after every reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSettings {
    pub worlds: Vec<CompactString>,
    #[serde(default)]
    pub characters: Vec<CompactString>,
    pub event_names: Vec<CompactString>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub logical_and_characters_with_worlds: bool,
}

impl SubscriptionSettings {
    /// Every character on the given worlds, for the given event kinds.
    pub fn for_worlds(worlds: &[WorldId], kinds: &[EventKind]) -> Self {
        Self {
            worlds: worlds.iter().map(|w| CompactString::from(w.to_string())).collect(),
            characters: vec![CompactString::const_new(ALL)],
            event_names: kinds.iter().map(|k| CompactString::const_new(k.as_str())).collect(),
            logical_and_characters_with_worlds: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event_names.is_empty() || (self.worlds.is_empty() && self.characters.is_empty())
    }
}

/// A client-to-server command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Command {
    #[serde(rename = "subscribe")]
    Subscribe {
        service: CompactString,
        #[serde(flatten)]
        settings: SubscriptionSettings,
    },
    #[serde(rename = "clearSubscribe")]
    ClearSubscribe {
        service: CompactString,
        all: bool,
    },
    #[serde(rename = "echo")]
    Echo {
        service: CompactString,
        payload: serde_json::Value,
    },
}

impl Command {
    const EVENT_SERVICE: &str = "event";

    pub fn subscribe(settings: SubscriptionSettings) -> Self {
        Command::Subscribe {
            service: CompactString::const_new(Self::EVENT_SERVICE),
            settings,
        }
    }

    pub fn clear_all() -> Self {
        Command::ClearSubscribe {
            service: CompactString::const_new(Self::EVENT_SERVICE),
            all: true,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
