//! Event type definitions for the ingestion pipeline.
//!
//! Wire-level values ([`ServerMessage`], [`GameEvent`]) come from the sdk and
//! are routed by their own kind enums. [`TrackerEvent`] is what the trackers
//! derive from the stream for downstream consumers.

use crate::publisher::Keyed;
use auraxis_sdk::objects::{EventKind, FactionId, GameEvent, MessageKind, ServerMessage, WorldId, ZoneId};
use compact_str::CompactString;
use std::collections::BTreeSet;
use time::OffsetDateTime;

impl Keyed for ServerMessage {
    type Key = MessageKind;

    fn key(&self) -> MessageKind {
        self.kind()
    }
}

impl Keyed for GameEvent {
    type Key = EventKind;

    fn key(&self) -> EventKind {
        self.kind()
    }
}

/// Discriminant of [`TrackerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerEventKind {
    FacilityControl,
    FacilityLoss,
    OutfitMembersUpdate,
}

impl TrackerEventKind {
    pub const ALL: [TrackerEventKind; 3] = [
        TrackerEventKind::FacilityControl,
        TrackerEventKind::FacilityLoss,
        TrackerEventKind::OutfitMembersUpdate,
    ];
}

/// A facility changing hands.
///
/// The same value is published twice: once as [`TrackerEvent::FacilityControl`]
/// for the new owner and once as [`TrackerEvent::FacilityLoss`] for the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityChange {
    pub world: WorldId,
    pub zone: ZoneId,
    pub facility_id: CompactString,
    /// Outfit credited with the capture, if any.
    pub outfit_id: Option<CompactString>,
    /// Owner recorded before this capture. `None` on the first capture seen.
    pub old_outfit_id: Option<CompactString>,
    pub new_faction: FactionId,
    pub old_faction: FactionId,
    pub timestamp: OffsetDateTime,
}

/// Member set change of one outfit between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembersDiff {
    pub joined: BTreeSet<CompactString>,
    pub left: BTreeSet<CompactString>,
}

impl MembersDiff {
    pub fn between(previous: &BTreeSet<CompactString>, current: &BTreeSet<CompactString>) -> Self {
        Self {
            joined: current.difference(previous).cloned().collect(),
            left: previous.difference(current).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Events derived by the trackers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    FacilityControl(FacilityChange),
    FacilityLoss(FacilityChange),
    OutfitMembersUpdate {
        outfit_id: CompactString,
        diff: MembersDiff,
    },
}

impl Keyed for TrackerEvent {
    type Key = TrackerEventKind;

    fn key(&self) -> TrackerEventKind {
        match self {
            TrackerEvent::FacilityControl(_) => TrackerEventKind::FacilityControl,
            TrackerEvent::FacilityLoss(_) => TrackerEventKind::FacilityLoss,
            TrackerEvent::OutfitMembersUpdate { .. } => TrackerEventKind::OutfitMembersUpdate,
        }
    }
}
