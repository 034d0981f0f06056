//! Game topology identifiers: platforms, worlds, zones and factions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Game platform. Each platform has its own push endpoint and Census
/// namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Pc,
    Ps4Eu,
    Ps4Us,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Pc, Platform::Ps4Eu, Platform::Ps4Us];

    /// Value of the `environment` query parameter of the push endpoint.
    pub fn environment(self) -> &'static str {
        match self {
            Platform::Pc => "ps2",
            Platform::Ps4Eu => "ps2ps4eu",
            Platform::Ps4Us => "ps2ps4us",
        }
    }

    /// Census REST namespace.
    pub fn namespace(self) -> &'static str {
        match self {
            Platform::Pc => "ps2:v2",
            Platform::Ps4Eu => "ps2ps4eu:v2",
            Platform::Ps4Us => "ps2ps4us:v2",
        }
    }

    /// Worlds that are publicly playable on this platform.
    pub fn default_worlds(self) -> &'static [WorldId] {
        const PC: &[WorldId] = &[
            WorldId::CONNERY,
            WorldId::MILLER,
            WorldId::COBALT,
            WorldId::EMERALD,
            WorldId::JAEGER,
            WorldId::SOLTECH,
        ];
        const PS4_US: &[WorldId] = &[WorldId::GENUDINE];
        const PS4_EU: &[WorldId] = &[WorldId::CERES];
        match self {
            Platform::Pc => PC,
            Platform::Ps4Eu => PS4_EU,
            Platform::Ps4Us => PS4_US,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Pc => "pc",
            Platform::Ps4Eu => "ps4eu",
            Platform::Ps4Us => "ps4us",
        })
    }
}

/// Error returned when a wire id cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {value:?}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u32>().map($name).map_err(|_| InvalidId {
                    kind: $kind,
                    value: s.to_owned(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// A world (server shard).
    WorldId,
    "world"
);
numeric_id!(
    /// A zone (continent). Instanced zones encode the instance number in the
    /// high 16 bits.
    ZoneId,
    "zone"
);
numeric_id!(
    /// A faction: 1 VS, 2 NC, 3 TR, 4 NSO.
    FactionId,
    "faction"
);

impl WorldId {
    pub const CONNERY: WorldId = WorldId(1);
    pub const MILLER: WorldId = WorldId(10);
    pub const COBALT: WorldId = WorldId(13);
    pub const EMERALD: WorldId = WorldId(17);
    pub const JAEGER: WorldId = WorldId(19);
    pub const SOLTECH: WorldId = WorldId(40);
    pub const GENUDINE: WorldId = WorldId(1000);
    pub const CERES: WorldId = WorldId(2000);

    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            WorldId::CONNERY => "Connery",
            WorldId::MILLER => "Miller",
            WorldId::COBALT => "Cobalt",
            WorldId::EMERALD => "Emerald",
            WorldId::JAEGER => "Jaeger",
            WorldId::SOLTECH => "SolTech",
            WorldId::GENUDINE => "Genudine",
            WorldId::CERES => "Ceres",
            _ => return None,
        })
    }
}

impl ZoneId {
    pub const INDAR: ZoneId = ZoneId(2);
    pub const HOSSIN: ZoneId = ZoneId(4);
    pub const AMERISH: ZoneId = ZoneId(6);
    pub const ESAMIR: ZoneId = ZoneId(8);
    pub const OSHUR: ZoneId = ZoneId(344);

    /// Continents that host alerts and territory control.
    pub const CONTINENTS: [ZoneId; 5] = [
        ZoneId::INDAR,
        ZoneId::HOSSIN,
        ZoneId::AMERISH,
        ZoneId::ESAMIR,
        ZoneId::OSHUR,
    ];

    /// Zone definition, shared by every instance of the same continent.
    pub fn definition(self) -> ZoneId {
        ZoneId(self.0 & 0xFFFF)
    }

    /// Instance number, zero for the permanent continents.
    pub fn instance(self) -> u32 {
        self.0 >> 16
    }

    pub fn name(self) -> Option<&'static str> {
        Some(match self.definition() {
            ZoneId::INDAR => "Indar",
            ZoneId::HOSSIN => "Hossin",
            ZoneId::AMERISH => "Amerish",
            ZoneId::ESAMIR => "Esamir",
            ZoneId::OSHUR => "Oshur",
            _ => return None,
        })
    }
}

impl FactionId {
    pub const NONE: FactionId = FactionId(0);
    pub const VS: FactionId = FactionId(1);
    pub const NC: FactionId = FactionId(2);
    pub const TR: FactionId = FactionId(3);
    pub const NSO: FactionId = FactionId(4);

    pub fn tag(self) -> &'static str {
        match self {
            FactionId::VS => "VS",
            FactionId::NC => "NC",
            FactionId::TR => "TR",
            FactionId::NSO => "NSO",
            _ => "",
        }
    }
}
