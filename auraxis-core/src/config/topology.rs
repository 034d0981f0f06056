//! Known world/zone pairs.

use auraxis_sdk::objects::{Platform, WorldId, ZoneId};
use std::collections::{BTreeMap, BTreeSet};

/// The world/zone pairs trackers keep state for.
///
/// Events naming a pair outside the topology are logged and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorldTopology {
    worlds: BTreeMap<WorldId, BTreeSet<ZoneId>>,
}

impl WorldTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every continent on the default worlds of the given platforms.
    pub fn for_platforms(platforms: &[Platform]) -> Self {
        let mut topology = Self::new();
        for platform in platforms {
            for world in platform.default_worlds() {
                topology.add_world(*world, ZoneId::CONTINENTS);
            }
        }
        topology
    }

    pub fn add_world(&mut self, world: WorldId, zones: impl IntoIterator<Item = ZoneId>) {
        self.worlds
            .entry(world)
            .or_default()
            .extend(zones.into_iter().map(ZoneId::definition));
    }

    pub fn contains_world(&self, world: WorldId) -> bool {
        self.worlds.contains_key(&world)
    }

    /// Zones are compared by definition so instances of a known continent match.
    pub fn contains(&self, world: WorldId, zone: ZoneId) -> bool {
        self.worlds
            .get(&world)
            .is_some_and(|zones| zones.contains(&zone.definition()))
    }

    pub fn worlds(&self) -> impl Iterator<Item = WorldId> + '_ {
        self.worlds.keys().copied()
    }

    pub fn zones(&self, world: WorldId) -> impl Iterator<Item = ZoneId> + '_ {
        self.worlds.get(&world).into_iter().flatten().copied()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (WorldId, ZoneId)> + '_ {
        self.worlds
            .iter()
            .flat_map(|(world, zones)| zones.iter().map(move |zone| (*world, *zone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_platforms() {
        let topology = WorldTopology::for_platforms(&[Platform::Pc]);
        assert!(topology.contains(WorldId::EMERALD, ZoneId::INDAR));
        assert!(topology.contains(WorldId::MILLER, ZoneId((2 << 16) | 344)));
        assert!(!topology.contains(WorldId::CERES, ZoneId::INDAR));
        assert!(!topology.contains(WorldId::EMERALD, ZoneId(96)));
        assert_eq!(topology.pairs().count(), 6 * ZoneId::CONTINENTS.len());
    }
}
