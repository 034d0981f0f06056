//! Top-level messages pushed by the streaming service.
//!
//! The service tags most frames with `service` and `type`:
//!
//! ```json
//! {"connected":"true","service":"push","type":"connectionStateChanged"}
//! {"online":{"EventServerEndpoint_Connery_1":"true"},"service":"event","type":"heartbeat"}
//! {"detail":"EventServerEndpoint_Cobalt_13","online":"true","service":"event","type":"serviceStateChanged"}
//! {"payload":{"event_name":"PlayerLogin", ...},"service":"event","type":"serviceMessage"}
//! ```
//!
//! Two frames carry no `type` at all: the subscription echo
//! (`{"subscription":{...}}`) and the help text (`{"send this for help":...}`).

use super::events::{EventKind, GameEvent};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Discriminant of [`ServerMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ConnectionStateChanged,
    Heartbeat,
    ServiceStateChanged,
    ServiceMessage,
    Subscription,
    Help,
}

impl MessageKind {
    /// Map the wire `type` field to a kind.
    pub fn from_type(ty: &str) -> Option<Self> {
        Some(match ty {
            "connectionStateChanged" => MessageKind::ConnectionStateChanged,
            "heartbeat" => MessageKind::Heartbeat,
            "serviceStateChanged" => MessageKind::ServiceStateChanged,
            "serviceMessage" => MessageKind::ServiceMessage,
            _ => return None,
        })
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::ConnectionStateChanged => "connectionStateChanged",
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::ServiceStateChanged => "serviceStateChanged",
            MessageKind::ServiceMessage => "serviceMessage",
            MessageKind::Subscription => "subscription",
            MessageKind::Help => "help",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStateChanged {
    pub connected: CompactString,
    #[serde(default)]
    pub service: CompactString,
}

impl ConnectionStateChanged {
    pub fn is_connected(&self) -> bool {
        self.connected == "true"
    }
}

/// Periodic liveness report of every upstream event server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(default)]
    pub online: BTreeMap<CompactString, CompactString>,
}

impl Heartbeat {
    /// Endpoints currently reported offline.
    pub fn offline_endpoints(&self) -> impl Iterator<Item = &str> {
        self.online
            .iter()
            .filter(|(_, online)| online.as_str() != "true")
            .map(|(endpoint, _)| endpoint.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStateChanged {
    pub detail: CompactString,
    pub online: CompactString,
}

impl ServiceStateChanged {
    pub fn is_online(&self) -> bool {
        self.online == "true"
    }
}

/// Echo of the effective subscription, sent after every subscribe command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEcho {
    #[serde(default)]
    pub character_count: u64,
    #[serde(default)]
    pub event_names: Vec<CompactString>,
    #[serde(default)]
    pub logical_and_characters_with_worlds: bool,
    #[serde(default)]
    pub worlds: Vec<CompactString>,
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    ConnectionStateChanged(ConnectionStateChanged),
    Heartbeat(Heartbeat),
    ServiceStateChanged(ServiceStateChanged),
    ServiceMessage(GameEvent),
    Subscription(SubscriptionEcho),
    Help(serde_json::Value),
}

impl ServerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::ConnectionStateChanged(_) => MessageKind::ConnectionStateChanged,
            ServerMessage::Heartbeat(_) => MessageKind::Heartbeat,
            ServerMessage::ServiceStateChanged(_) => MessageKind::ServiceStateChanged,
            ServerMessage::ServiceMessage(_) => MessageKind::ServiceMessage,
            ServerMessage::Subscription(_) => MessageKind::Subscription,
            ServerMessage::Help(_) => MessageKind::Help,
        }
    }

    pub fn event_kind(&self) -> Option<EventKind> {
        match self {
            ServerMessage::ServiceMessage(event) => Some(event.kind()),
            _ => None,
        }
    }
}
