//! Game event payloads carried by `serviceMessage` envelopes.
//!
//! Every scalar arrives as a JSON string. Fields are kept as strings and
//! parsed on demand through the accessors on [`GameEvent`], so a single bad
//! field never rejects an otherwise usable event.

use super::world::{FactionId, WorldId, ZoneId};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Discriminant of [`GameEvent`]. The string form is the wire `event_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PlayerLogin,
    PlayerLogout,
    Death,
    AchievementEarned,
    BattleRankUp,
    GainExperience,
    ItemAdded,
    PlayerFacilityCapture,
    PlayerFacilityDefend,
    SkillAdded,
    VehicleDestroy,
    ContinentLock,
    FacilityControl,
    MetagameEvent,
}

impl EventKind {
    pub const ALL: [EventKind; 14] = [
        EventKind::PlayerLogin,
        EventKind::PlayerLogout,
        EventKind::Death,
        EventKind::AchievementEarned,
        EventKind::BattleRankUp,
        EventKind::GainExperience,
        EventKind::ItemAdded,
        EventKind::PlayerFacilityCapture,
        EventKind::PlayerFacilityDefend,
        EventKind::SkillAdded,
        EventKind::VehicleDestroy,
        EventKind::ContinentLock,
        EventKind::FacilityControl,
        EventKind::MetagameEvent,
    ];

    /// Kinds whose payload carries both a zone id and a character id.
    pub const ZONE_TRANSITIONS: [EventKind; 10] = [
        EventKind::Death,
        EventKind::AchievementEarned,
        EventKind::BattleRankUp,
        EventKind::GainExperience,
        EventKind::ItemAdded,
        EventKind::PlayerFacilityCapture,
        EventKind::PlayerFacilityDefend,
        EventKind::SkillAdded,
        EventKind::VehicleDestroy,
        EventKind::MetagameEvent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PlayerLogin => "PlayerLogin",
            EventKind::PlayerLogout => "PlayerLogout",
            EventKind::Death => "Death",
            EventKind::AchievementEarned => "AchievementEarned",
            EventKind::BattleRankUp => "BattleRankUp",
            EventKind::GainExperience => "GainExperience",
            EventKind::ItemAdded => "ItemAdded",
            EventKind::PlayerFacilityCapture => "PlayerFacilityCapture",
            EventKind::PlayerFacilityDefend => "PlayerFacilityDefend",
            EventKind::SkillAdded => "SkillAdded",
            EventKind::VehicleDestroy => "VehicleDestroy",
            EventKind::ContinentLock => "ContinentLock",
            EventKind::FacilityControl => "FacilityControl",
            EventKind::MetagameEvent => "MetagameEvent",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLogin {
    pub character_id: CompactString,
    pub world_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLogout {
    pub character_id: CompactString,
    pub world_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Death {
    pub character_id: CompactString,
    #[serde(default)]
    pub attacker_character_id: CompactString,
    #[serde(default)]
    pub attacker_fire_mode_id: CompactString,
    #[serde(default)]
    pub attacker_loadout_id: CompactString,
    #[serde(default)]
    pub attacker_vehicle_id: CompactString,
    #[serde(default)]
    pub attacker_weapon_id: CompactString,
    #[serde(default)]
    pub attacker_team_id: CompactString,
    #[serde(default)]
    pub character_loadout_id: CompactString,
    #[serde(default)]
    pub team_id: CompactString,
    #[serde(default)]
    pub is_critical: CompactString,
    #[serde(default)]
    pub is_headshot: CompactString,
    #[serde(default)]
    pub vehicle_id: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementEarned {
    pub character_id: CompactString,
    #[serde(default)]
    pub achievement_id: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRankUp {
    pub character_id: CompactString,
    #[serde(default)]
    pub battle_rank: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainExperience {
    pub character_id: CompactString,
    #[serde(default)]
    pub experience_id: CompactString,
    #[serde(default)]
    pub amount: CompactString,
    #[serde(default)]
    pub loadout_id: CompactString,
    #[serde(default)]
    pub other_id: CompactString,
    #[serde(default)]
    pub team_id: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub character_id: CompactString,
    #[serde(default)]
    pub item_id: CompactString,
    #[serde(default)]
    pub item_count: CompactString,
    #[serde(default)]
    pub context: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

/// Shared shape of `PlayerFacilityCapture` and `PlayerFacilityDefend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFacilityEvent {
    pub character_id: CompactString,
    pub facility_id: CompactString,
    #[serde(default)]
    pub outfit_id: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillAdded {
    pub character_id: CompactString,
    #[serde(default)]
    pub skill_id: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDestroy {
    pub character_id: CompactString,
    #[serde(default)]
    pub attacker_character_id: CompactString,
    #[serde(default)]
    pub attacker_loadout_id: CompactString,
    #[serde(default)]
    pub attacker_vehicle_id: CompactString,
    #[serde(default)]
    pub attacker_weapon_id: CompactString,
    #[serde(default)]
    pub attacker_team_id: CompactString,
    #[serde(default)]
    pub facility_id: CompactString,
    #[serde(default)]
    pub faction_id: CompactString,
    #[serde(default)]
    pub team_id: CompactString,
    #[serde(default)]
    pub vehicle_id: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinentLock {
    #[serde(default)]
    pub metagame_event_id: CompactString,
    #[serde(default)]
    pub triggering_faction: CompactString,
    #[serde(default)]
    pub previous_faction: CompactString,
    #[serde(default)]
    pub vs_population: CompactString,
    #[serde(default)]
    pub nc_population: CompactString,
    #[serde(default)]
    pub tr_population: CompactString,
    #[serde(default)]
    pub event_type: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityControl {
    pub facility_id: CompactString,
    #[serde(default)]
    pub outfit_id: CompactString,
    pub new_faction_id: CompactString,
    pub old_faction_id: CompactString,
    #[serde(default)]
    pub duration_held: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

impl FacilityControl {
    /// A successful defense reports the same faction on both sides.
    pub fn is_defense(&self) -> bool {
        self.old_faction_id.trim() == self.new_faction_id.trim()
    }

    pub fn new_faction(&self) -> Option<FactionId> {
        self.new_faction_id.parse().ok()
    }

    pub fn old_faction(&self) -> Option<FactionId> {
        self.old_faction_id.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetagameEvent {
    pub instance_id: CompactString,
    pub metagame_event_id: CompactString,
    #[serde(default)]
    pub metagame_event_state: CompactString,
    #[serde(default)]
    pub metagame_event_state_name: CompactString,
    #[serde(default)]
    pub experience_bonus: CompactString,
    #[serde(default)]
    pub faction_nc: CompactString,
    #[serde(default)]
    pub faction_tr: CompactString,
    #[serde(default)]
    pub faction_vs: CompactString,
    pub world_id: CompactString,
    pub zone_id: CompactString,
    #[serde(default)]
    pub timestamp: CompactString,
}

/// Lifecycle transition reported by a `MetagameEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetagameEventState {
    Started,
    Restarted,
    Cancelled,
    Ended,
    ExperienceBonusChanged,
}

impl MetagameEventState {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            135 => MetagameEventState::Started,
            136 => MetagameEventState::Restarted,
            137 => MetagameEventState::Cancelled,
            138 => MetagameEventState::Ended,
            139 => MetagameEventState::ExperienceBonusChanged,
            _ => return None,
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Some(if name.eq_ignore_ascii_case("started") {
            MetagameEventState::Started
        } else if name.eq_ignore_ascii_case("restarted") {
            MetagameEventState::Restarted
        } else if name.eq_ignore_ascii_case("canceled") || name.eq_ignore_ascii_case("cancelled") {
            MetagameEventState::Cancelled
        } else if name.eq_ignore_ascii_case("ended") {
            MetagameEventState::Ended
        } else if name.eq_ignore_ascii_case("xp change") {
            MetagameEventState::ExperienceBonusChanged
        } else {
            return None;
        })
    }
}

impl MetagameEvent {
    /// The state name is authoritative; the numeric code is a fallback.
    pub fn state(&self) -> Option<MetagameEventState> {
        MetagameEventState::from_name(&self.metagame_event_state_name).or_else(|| {
            self.metagame_event_state
                .trim()
                .parse()
                .ok()
                .and_then(MetagameEventState::from_code)
        })
    }

    pub fn is_started(&self) -> bool {
        self.state() == Some(MetagameEventState::Started)
    }

    pub fn event_type(&self) -> Option<u32> {
        self.metagame_event_id.trim().parse().ok()
    }
}

/// A decoded game event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_name")]
pub enum GameEvent {
    PlayerLogin(PlayerLogin),
    PlayerLogout(PlayerLogout),
    Death(Death),
    AchievementEarned(AchievementEarned),
    BattleRankUp(BattleRankUp),
    GainExperience(GainExperience),
    ItemAdded(ItemAdded),
    PlayerFacilityCapture(PlayerFacilityEvent),
    PlayerFacilityDefend(PlayerFacilityEvent),
    SkillAdded(SkillAdded),
    VehicleDestroy(VehicleDestroy),
    ContinentLock(ContinentLock),
    FacilityControl(FacilityControl),
    MetagameEvent(MetagameEvent),
}

impl GameEvent {
    /// Decode a raw `payload` object for an already classified kind.
    pub fn from_payload(
        kind: EventKind,
        payload: serde_json::Value,
    ) -> Result<GameEvent, serde_json::Error> {
        use serde_json::from_value;
        Ok(match kind {
            EventKind::PlayerLogin => GameEvent::PlayerLogin(from_value(payload)?),
            EventKind::PlayerLogout => GameEvent::PlayerLogout(from_value(payload)?),
            EventKind::Death => GameEvent::Death(from_value(payload)?),
            EventKind::AchievementEarned => GameEvent::AchievementEarned(from_value(payload)?),
            EventKind::BattleRankUp => GameEvent::BattleRankUp(from_value(payload)?),
            EventKind::GainExperience => GameEvent::GainExperience(from_value(payload)?),
            EventKind::ItemAdded => GameEvent::ItemAdded(from_value(payload)?),
            EventKind::PlayerFacilityCapture => {
                GameEvent::PlayerFacilityCapture(from_value(payload)?)
            }
            EventKind::PlayerFacilityDefend => GameEvent::PlayerFacilityDefend(from_value(payload)?),
            EventKind::SkillAdded => GameEvent::SkillAdded(from_value(payload)?),
            EventKind::VehicleDestroy => GameEvent::VehicleDestroy(from_value(payload)?),
            EventKind::ContinentLock => GameEvent::ContinentLock(from_value(payload)?),
            EventKind::FacilityControl => GameEvent::FacilityControl(from_value(payload)?),
            EventKind::MetagameEvent => GameEvent::MetagameEvent(from_value(payload)?),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::PlayerLogin(_) => EventKind::PlayerLogin,
            GameEvent::PlayerLogout(_) => EventKind::PlayerLogout,
            GameEvent::Death(_) => EventKind::Death,
            GameEvent::AchievementEarned(_) => EventKind::AchievementEarned,
            GameEvent::BattleRankUp(_) => EventKind::BattleRankUp,
            GameEvent::GainExperience(_) => EventKind::GainExperience,
            GameEvent::ItemAdded(_) => EventKind::ItemAdded,
            GameEvent::PlayerFacilityCapture(_) => EventKind::PlayerFacilityCapture,
            GameEvent::PlayerFacilityDefend(_) => EventKind::PlayerFacilityDefend,
            GameEvent::SkillAdded(_) => EventKind::SkillAdded,
            GameEvent::VehicleDestroy(_) => EventKind::VehicleDestroy,
            GameEvent::ContinentLock(_) => EventKind::ContinentLock,
            GameEvent::FacilityControl(_) => EventKind::FacilityControl,
            GameEvent::MetagameEvent(_) => EventKind::MetagameEvent,
        }
    }

    fn raw_world_id(&self) -> &str {
        match self {
            GameEvent::PlayerLogin(e) => &e.world_id,
            GameEvent::PlayerLogout(e) => &e.world_id,
            GameEvent::Death(e) => &e.world_id,
            GameEvent::AchievementEarned(e) => &e.world_id,
            GameEvent::BattleRankUp(e) => &e.world_id,
            GameEvent::GainExperience(e) => &e.world_id,
            GameEvent::ItemAdded(e) => &e.world_id,
            GameEvent::PlayerFacilityCapture(e) | GameEvent::PlayerFacilityDefend(e) => &e.world_id,
            GameEvent::SkillAdded(e) => &e.world_id,
            GameEvent::VehicleDestroy(e) => &e.world_id,
            GameEvent::ContinentLock(e) => &e.world_id,
            GameEvent::FacilityControl(e) => &e.world_id,
            GameEvent::MetagameEvent(e) => &e.world_id,
        }
    }

    fn raw_zone_id(&self) -> Option<&str> {
        Some(match self {
            GameEvent::PlayerLogin(_) | GameEvent::PlayerLogout(_) => return None,
            GameEvent::Death(e) => &e.zone_id,
            GameEvent::AchievementEarned(e) => &e.zone_id,
            GameEvent::BattleRankUp(e) => &e.zone_id,
            GameEvent::GainExperience(e) => &e.zone_id,
            GameEvent::ItemAdded(e) => &e.zone_id,
            GameEvent::PlayerFacilityCapture(e) | GameEvent::PlayerFacilityDefend(e) => &e.zone_id,
            GameEvent::SkillAdded(e) => &e.zone_id,
            GameEvent::VehicleDestroy(e) => &e.zone_id,
            GameEvent::ContinentLock(e) => &e.zone_id,
            GameEvent::FacilityControl(e) => &e.zone_id,
            GameEvent::MetagameEvent(e) => &e.zone_id,
        })
    }

    fn raw_timestamp(&self) -> &str {
        match self {
            GameEvent::PlayerLogin(e) => &e.timestamp,
            GameEvent::PlayerLogout(e) => &e.timestamp,
            GameEvent::Death(e) => &e.timestamp,
            GameEvent::AchievementEarned(e) => &e.timestamp,
            GameEvent::BattleRankUp(e) => &e.timestamp,
            GameEvent::GainExperience(e) => &e.timestamp,
            GameEvent::ItemAdded(e) => &e.timestamp,
            GameEvent::PlayerFacilityCapture(e) | GameEvent::PlayerFacilityDefend(e) => &e.timestamp,
            GameEvent::SkillAdded(e) => &e.timestamp,
            GameEvent::VehicleDestroy(e) => &e.timestamp,
            GameEvent::ContinentLock(e) => &e.timestamp,
            GameEvent::FacilityControl(e) => &e.timestamp,
            GameEvent::MetagameEvent(e) => &e.timestamp,
        }
    }

    pub fn world_id(&self) -> Option<WorldId> {
        self.raw_world_id().parse().ok()
    }

    pub fn zone_id(&self) -> Option<ZoneId> {
        self.raw_zone_id().and_then(|raw| raw.parse().ok())
    }

    /// Event time as reported by the server (unix seconds).
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        let secs: i64 = self.raw_timestamp().trim().parse().ok()?;
        OffsetDateTime::from_unix_timestamp(secs).ok()
    }

    /// Primary character the event is about, if any.
    pub fn character_id(&self) -> Option<&CompactString> {
        let id = match self {
            GameEvent::PlayerLogin(e) => &e.character_id,
            GameEvent::PlayerLogout(e) => &e.character_id,
            GameEvent::Death(e) => &e.character_id,
            GameEvent::AchievementEarned(e) => &e.character_id,
            GameEvent::BattleRankUp(e) => &e.character_id,
            GameEvent::GainExperience(e) => &e.character_id,
            GameEvent::ItemAdded(e) => &e.character_id,
            GameEvent::PlayerFacilityCapture(e) | GameEvent::PlayerFacilityDefend(e) => {
                &e.character_id
            }
            GameEvent::SkillAdded(e) => &e.character_id,
            GameEvent::VehicleDestroy(e) => &e.character_id,
            GameEvent::ContinentLock(_)
            | GameEvent::FacilityControl(_)
            | GameEvent::MetagameEvent(_) => return None,
        };
        is_character_id(id).then_some(id)
    }

    /// Every character this event places in its zone.
    ///
    /// Kill events place both the victim and the attacker.
    pub fn zone_characters(&self) -> SmallVec<[&CompactString; 2]> {
        let mut ids = SmallVec::new();
        if self.raw_zone_id().is_none() {
            return ids;
        }
        if let Some(id) = self.character_id() {
            ids.push(id);
        }
        let attacker = match self {
            GameEvent::Death(e) => Some(&e.attacker_character_id),
            GameEvent::VehicleDestroy(e) => Some(&e.attacker_character_id),
            _ => None,
        };
        if let Some(attacker) = attacker.filter(|id| is_character_id(id)) {
            if !ids.contains(&attacker) {
                ids.push(attacker);
            }
        }
        ids
    }
}

/// The service reports "0" for absent characters (environment deaths, NPCs).
fn is_character_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty() && id != "0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_death_payload() {
        let payload = json!({
            "attacker_character_id": "5428010618035323201",
            "attacker_weapon_id": "7214",
            "character_id": "5428013610475355873",
            "event_name": "Death",
            "is_headshot": "1",
            "timestamp": "1700000000",
            "world_id": "17",
            "zone_id": "2"
        });
        let event = GameEvent::from_payload(EventKind::Death, payload).unwrap();
        assert_eq!(event.kind(), EventKind::Death);
        assert_eq!(event.world_id(), Some(WorldId::EMERALD));
        assert_eq!(event.zone_id(), Some(ZoneId::INDAR));
        assert_eq!(event.zone_characters().len(), 2);
        assert_eq!(
            event.timestamp().map(|t| t.unix_timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_environment_death_has_single_character() {
        let payload = json!({
            "attacker_character_id": "0",
            "character_id": "5428013610475355873",
            "world_id": "1",
            "zone_id": "4"
        });
        let event = GameEvent::from_payload(EventKind::Death, payload).unwrap();
        assert_eq!(event.zone_characters().as_slice(), &[&CompactString::from("5428013610475355873")]);
    }

    #[test]
    fn test_login_has_no_zone() {
        let payload = json!({"character_id": "1", "world_id": "13", "timestamp": "1"});
        let event = GameEvent::from_payload(EventKind::PlayerLogin, payload).unwrap();
        assert_eq!(event.zone_id(), None);
        assert!(event.zone_characters().is_empty());
    }

    #[test]
    fn test_metagame_state_parsing() {
        let payload = json!({
            "instance_id": "12",
            "metagame_event_id": "147",
            "metagame_event_state": "135",
            "metagame_event_state_name": "started",
            "world_id": "10",
            "zone_id": "6"
        });
        let GameEvent::MetagameEvent(event) =
            GameEvent::from_payload(EventKind::MetagameEvent, payload).unwrap()
        else {
            panic!("expected metagame event");
        };
        assert!(event.is_started());
        assert_eq!(event.event_type(), Some(147));

        let numeric_only = MetagameEvent {
            metagame_event_state_name: CompactString::default(),
            metagame_event_state: "138".into(),
            ..event
        };
        assert_eq!(numeric_only.state(), Some(MetagameEventState::Ended));
    }

    #[test]
    fn test_event_kind_round_trips_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert!("Nope".parse::<EventKind>().is_err());
    }
}
