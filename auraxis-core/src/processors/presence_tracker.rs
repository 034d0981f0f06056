//! PresenceTracker processor.
//!
//! The PresenceTracker is responsible for:
//! - Registering characters by outfit when they log in, after resolving
//!   their identity through the [`CharacterLoaderHandle`]
//! - Removing them on logout
//! - Counting characters per world and zone from every event that places a
//!   character in a zone
//! - Answering population and online-member queries
//!
//! Identity resolution runs in its own task per login so a slow lookup never
//! holds up the event stream. A logout may therefore overtake the resolution
//! of the login it belongs to; every logout leaves a marker carrying its
//! timestamp, and a resolution for a login that is not newer than the marker
//! is discarded. Markers expire after `missed_unregister_ttl`.

use super::character_loader::{CharacterLoaderHandle, LoadError};
use crate::config::PresenceConfig;
use crate::publisher::Subscription;
use auraxis_sdk::objects::events::{PlayerLogin, PlayerLogout};
use auraxis_sdk::objects::{Character, FactionId, GameEvent, WorldId, ZoneId};
use compact_str::CompactString;
use kanau::processor::Processor;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// Characters per zone of one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldPopulation {
    pub world: WorldId,
    pub total: u32,
    pub zones: BTreeMap<ZoneId, u32>,
}

/// Population of one zone split by faction.
///
/// Characters whose identity has not been resolved count towards `total`
/// and `unresolved` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ZonePopulation {
    pub total: u32,
    pub factions: BTreeMap<FactionId, u32>,
    pub unresolved: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldPopulationDetail {
    pub world: WorldId,
    pub total: u32,
    pub zones: BTreeMap<ZoneId, ZonePopulation>,
}

/// What a consumer wants to follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingSettings {
    pub outfits: Vec<CompactString>,
    pub characters: Vec<CompactString>,
}

/// Online subset of a [`TrackingSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackableOnlineEntities {
    /// Online members by tracked outfit id. Outfits with nobody online are
    /// present with an empty list.
    pub outfits: BTreeMap<CompactString, Vec<Character>>,
    pub characters: Vec<Character>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
/// Population of every world seen so far.
pub struct GetWorldsPopulation;

#[derive(Debug, Clone)]
/// Per-zone population of one world with faction split.
pub struct GetDetailedWorldPopulation {
    pub world: WorldId,
}

#[derive(Debug, Clone)]
/// Online members of the tracked outfits and online tracked characters.
pub struct GetTrackableOnlineEntities {
    pub settings: TrackingSettings,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct MissedUnregister {
    logout_at: OffsetDateTime,
    recorded_at: Instant,
}

#[derive(Default)]
struct PresenceState {
    /// outfit id (`None` for outfit-less characters) -> character id -> character
    outfits: HashMap<Option<CompactString>, HashMap<CompactString, Character>>,
    character_outfit: HashMap<CompactString, Option<CompactString>>,
    zones: HashMap<WorldId, HashMap<ZoneId, u32>>,
    last_zone: HashMap<CompactString, (WorldId, ZoneId)>,
    missed_unregister: HashMap<CompactString, MissedUnregister>,
}

impl PresenceState {
    fn register(&mut self, character: Character, login_at: OffsetDateTime) -> bool {
        if let Some(marker) = self.missed_unregister.get(&character.id) {
            if marker.logout_at >= login_at {
                return false;
            }
        }
        self.unregister(&character.id);
        let outfit = character.outfit_id().cloned();
        self.character_outfit
            .insert(character.id.clone(), outfit.clone());
        self.outfits
            .entry(outfit)
            .or_default()
            .insert(character.id.clone(), character);
        true
    }

    fn unregister(&mut self, id: &str) -> bool {
        let Some(outfit) = self.character_outfit.remove(id) else {
            return false;
        };
        if let Some(members) = self.outfits.get_mut(&outfit) {
            members.remove(id);
            if members.is_empty() {
                self.outfits.remove(&outfit);
            }
        }
        true
    }

    fn record_logout(&mut self, id: CompactString, logout_at: OffsetDateTime) {
        let marker = self
            .missed_unregister
            .entry(id)
            .or_insert(MissedUnregister {
                logout_at,
                recorded_at: Instant::now(),
            });
        marker.logout_at = marker.logout_at.max(logout_at);
        marker.recorded_at = Instant::now();
    }

    fn move_to_zone(&mut self, world: WorldId, zone: ZoneId, id: &CompactString) -> bool {
        match self.last_zone.get(id) {
            Some(&(w, z)) if w == world && z == zone => return false,
            Some(&(w, z)) => self.decrement(w, z),
            None => {}
        }
        *self.zones.entry(world).or_default().entry(zone).or_default() += 1;
        self.last_zone.insert(id.clone(), (world, zone));
        true
    }

    fn leave_zone(&mut self, id: &str) {
        if let Some((world, zone)) = self.last_zone.remove(id) {
            self.decrement(world, zone);
        }
    }

    fn decrement(&mut self, world: WorldId, zone: ZoneId) {
        if let Some(count) = self.zones.get_mut(&world).and_then(|zones| zones.get_mut(&zone)) {
            *count = count.saturating_sub(1);
        }
    }

    fn character(&self, id: &str) -> Option<&Character> {
        let outfit = self.character_outfit.get(id)?;
        self.outfits.get(outfit)?.get(id)
    }

    fn sweep_markers(&mut self, ttl: std::time::Duration) -> usize {
        let before = self.missed_unregister.len();
        self.missed_unregister
            .retain(|_, marker| marker.recorded_at.elapsed() < ttl);
        before - self.missed_unregister.len()
    }
}

fn event_time(raw: &str) -> OffsetDateTime {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

fn is_character_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty() && id != "0"
}

// ---------------------------------------------------------------------------
// PresenceTracker
// ---------------------------------------------------------------------------

pub struct PresenceTracker {
    state: Arc<RwLock<PresenceState>>,
    loader: CharacterLoaderHandle,
    config: PresenceConfig,
    resolutions: Mutex<JoinSet<()>>,
}

impl PresenceTracker {
    pub fn new(loader: CharacterLoaderHandle, config: PresenceConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(PresenceState::default())),
            loader,
            config,
            resolutions: Mutex::new(JoinSet::new()),
        }
    }

    /// Start resolving the character; it is registered once resolved.
    pub fn handle_login(&self, login: &PlayerLogin) {
        if !is_character_id(&login.character_id) {
            return;
        }
        let id = login.character_id.clone();
        let login_at = event_time(&login.timestamp);
        let loader = self.loader.clone();
        let state = Arc::clone(&self.state);

        let mut tasks = self
            .resolutions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.spawn(async move {
            match loader.load(id.clone()).await {
                Ok(character) => {
                    let outfit = character.outfit_id().cloned();
                    if state.write().await.register(character, login_at) {
                        debug!(character_id = %id, outfit_id = ?outfit, "Character online");
                    } else {
                        debug!(character_id = %id, "Discarded login overtaken by logout");
                    }
                }
                Err(LoadError::Closed) => {
                    debug!(character_id = %id, "Loader closed, dropping login");
                }
                Err(e) => {
                    warn!(character_id = %id, error = %e, "Could not resolve character, leaving untracked");
                }
            }
        });
    }

    pub async fn handle_logout(&self, logout: &PlayerLogout) {
        if !is_character_id(&logout.character_id) {
            return;
        }
        let logout_at = event_time(&logout.timestamp);
        let mut state = self.state.write().await;
        let removed = state.unregister(&logout.character_id);
        state.leave_zone(&logout.character_id);
        state.record_logout(logout.character_id.clone(), logout_at);
        debug!(character_id = %logout.character_id, removed, "Character offline");
    }

    /// Place characters in a zone. A character already counted there is a no-op.
    pub async fn handle_zone_transition(
        &self,
        world: WorldId,
        zone: ZoneId,
        characters: &[&CompactString],
    ) {
        if characters.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        for id in characters {
            if state.move_to_zone(world, zone, id) {
                debug!(character_id = %id, %world, %zone, "Zone transition");
            }
        }
    }

    // -- Reads --------------------------------------------------------------

    pub async fn online_count(&self) -> usize {
        self.state.read().await.character_outfit.len()
    }

    pub async fn is_online(&self, id: &str) -> bool {
        self.state.read().await.character_outfit.contains_key(id)
    }

    pub async fn online_outfit_members(&self, outfit_id: &str) -> Vec<Character> {
        let state = self.state.read().await;
        let mut members: Vec<Character> = state
            .outfits
            .get(&Some(CompactString::from(outfit_id)))
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }

    pub async fn zone_population(&self, world: WorldId, zone: ZoneId) -> u32 {
        self.state
            .read()
            .await
            .zones
            .get(&world)
            .and_then(|zones| zones.get(&zone))
            .copied()
            .unwrap_or(0)
    }

    pub async fn worlds_population(&self) -> BTreeMap<WorldId, WorldPopulation> {
        let state = self.state.read().await;
        state
            .zones
            .iter()
            .map(|(world, zones)| {
                let zones: BTreeMap<ZoneId, u32> = zones
                    .iter()
                    .filter(|(_, count)| **count > 0)
                    .map(|(zone, count)| (*zone, *count))
                    .collect();
                let population = WorldPopulation {
                    world: *world,
                    total: zones.values().sum(),
                    zones,
                };
                (*world, population)
            })
            .collect()
    }

    pub async fn detailed_world_population(&self, world: WorldId) -> WorldPopulationDetail {
        let state = self.state.read().await;
        let mut zones: BTreeMap<ZoneId, ZonePopulation> = BTreeMap::new();
        for (id, (w, zone)) in &state.last_zone {
            if *w != world {
                continue;
            }
            let population = zones.entry(*zone).or_default();
            population.total += 1;
            match state.character(id) {
                Some(character) => *population.factions.entry(character.faction).or_default() += 1,
                None => population.unresolved += 1,
            }
        }
        WorldPopulationDetail {
            world,
            total: zones.values().map(|zone| zone.total).sum(),
            zones,
        }
    }

    pub async fn trackable_online_entities(
        &self,
        settings: &TrackingSettings,
    ) -> TrackableOnlineEntities {
        let state = self.state.read().await;
        let mut entities = TrackableOnlineEntities::default();
        for outfit_id in &settings.outfits {
            let mut members: Vec<Character> = state
                .outfits
                .get(&Some(outfit_id.clone()))
                .map(|members| members.values().cloned().collect())
                .unwrap_or_default();
            members.sort_by(|a, b| a.name.cmp(&b.name));
            entities.outfits.insert(outfit_id.clone(), members);
        }
        entities.characters = settings
            .characters
            .iter()
            .filter_map(|id| state.character(id).cloned())
            .collect();
        entities
    }

    // -- Maintenance --------------------------------------------------------

    /// Drop missed-unregister markers older than the configured TTL.
    pub async fn sweep_expired_markers(&self) -> usize {
        self.state
            .write()
            .await
            .sweep_markers(self.config.missed_unregister_ttl)
    }

    pub async fn missed_unregister_count(&self) -> usize {
        self.state.read().await.missed_unregister.len()
    }

    /// Wait for every identity resolution started so far.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(
            &mut *self
                .resolutions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        while tasks.join_next().await.is_some() {}
    }

    fn reap_resolutions(&self) {
        let mut tasks = self
            .resolutions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    warn!(error = %e, "Character resolution task panicked");
                }
            }
        }
    }

    /// Consume `events` until shutdown, sweeping markers on an interval.
    ///
    /// Events already queued when shutdown arrives are still applied.
    /// Resolutions still running at that point are aborted.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
        mut events: Subscription<GameEvent>,
    ) {
        info!(
            missed_unregister_ttl = ?self.config.missed_unregister_ttl,
            "PresenceTracker started"
        );

        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sweep.tick().await;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("PresenceTracker received shutdown signal");
                        break;
                    }
                }

                Some(event) = events.recv() => {
                    let _ = self.process(event).await;
                }

                _ = sweep.tick() => {
                    self.reap_resolutions();
                    let expired = self.sweep_expired_markers().await;
                    if expired > 0 {
                        debug!(expired, "Dropped expired missed-unregister markers");
                    }
                }

                else => {
                    info!("Event subscription closed");
                    break;
                }
            }
        }

        let mut drained = 0usize;
        while let Some(event) = events.try_recv() {
            let _ = self.process(event).await;
            drained += 1;
        }

        let mut tasks = std::mem::take(
            &mut *self
                .resolutions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let aborted = tasks.len();
        tasks.shutdown().await;
        info!(drained, aborted, "PresenceTracker shutdown complete");
    }
}

impl Processor<GameEvent> for PresenceTracker {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, event: GameEvent) -> Result<(), Infallible> {
        match &event {
            GameEvent::PlayerLogin(login) => self.handle_login(login),
            GameEvent::PlayerLogout(logout) => self.handle_logout(logout).await,
            _ => {
                if let (Some(world), Some(zone)) = (event.world_id(), event.zone_id()) {
                    self.handle_zone_transition(world, zone, &event.zone_characters())
                        .await;
                }
            }
        }
        Ok(())
    }
}

impl Processor<GetWorldsPopulation> for PresenceTracker {
    type Output = BTreeMap<WorldId, WorldPopulation>;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Presence:GetWorldsPopulation")]
    async fn process(
        &self,
        _query: GetWorldsPopulation,
    ) -> Result<BTreeMap<WorldId, WorldPopulation>, Infallible> {
        Ok(self.worlds_population().await)
    }
}

impl Processor<GetDetailedWorldPopulation> for PresenceTracker {
    type Output = WorldPopulationDetail;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Presence:GetDetailedWorldPopulation")]
    async fn process(
        &self,
        query: GetDetailedWorldPopulation,
    ) -> Result<WorldPopulationDetail, Infallible> {
        Ok(self.detailed_world_population(query.world).await)
    }
}

impl Processor<GetTrackableOnlineEntities> for PresenceTracker {
    type Output = TrackableOnlineEntities;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Presence:GetTrackableOnlineEntities")]
    async fn process(
        &self,
        query: GetTrackableOnlineEntities,
    ) -> Result<TrackableOnlineEntities, Infallible> {
        Ok(self.trackable_online_entities(&query.settings).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::processors::character_loader::CharacterLoader;
    use crate::processors::character_loader::tests::{FakeResolver, character};
    use auraxis_sdk::objects::events::GainExperience;
    use auraxis_sdk::objects::EventKind;
    use std::time::Duration;

    fn login(id: &str, ts: i64) -> PlayerLogin {
        PlayerLogin {
            character_id: id.into(),
            world_id: "17".into(),
            timestamp: ts.to_string().into(),
        }
    }

    fn logout(id: &str, ts: i64) -> PlayerLogout {
        PlayerLogout {
            character_id: id.into(),
            world_id: "17".into(),
            timestamp: ts.to_string().into(),
        }
    }

    fn experience(id: &str, zone: ZoneId) -> GameEvent {
        let payload = serde_json::json!({
            "character_id": id,
            "experience_id": "4",
            "amount": "10",
            "other_id": "0",
            "loadout_id": "1",
            "world_id": "17",
            "zone_id": zone.to_string(),
            "timestamp": "1700000000"
        });
        GameEvent::GainExperience(serde_json::from_value::<GainExperience>(payload).unwrap())
    }

    fn tracker(resolver: FakeResolver) -> (PresenceTracker, watch::Sender<bool>) {
        let (loader, handle) = CharacterLoader::new(Arc::new(resolver), LoaderConfig::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(loader.run(shutdown_rx));
        (PresenceTracker::new(handle, PresenceConfig::default()), shutdown_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_zone_moves_and_logout_net_to_zero() {
        let (tracker, _shutdown) = tracker(FakeResolver::with([character(
            "c",
            Some("o1"),
            FactionId::VS,
        )]));

        tracker.process(GameEvent::PlayerLogin(login("c", 100))).await.unwrap();
        tracker.settle().await;
        tracker.process(experience("c", ZoneId::INDAR)).await.unwrap();
        assert_eq!(tracker.zone_population(WorldId::EMERALD, ZoneId::INDAR).await, 1);

        tracker.process(experience("c", ZoneId::INDAR)).await.unwrap();
        assert_eq!(tracker.zone_population(WorldId::EMERALD, ZoneId::INDAR).await, 1);

        tracker.process(experience("c", ZoneId::HOSSIN)).await.unwrap();
        assert_eq!(tracker.zone_population(WorldId::EMERALD, ZoneId::INDAR).await, 0);
        assert_eq!(tracker.zone_population(WorldId::EMERALD, ZoneId::HOSSIN).await, 1);
        assert_eq!(tracker.online_outfit_members("o1").await.len(), 1);

        tracker.process(GameEvent::PlayerLogout(logout("c", 200))).await.unwrap();
        assert_eq!(tracker.zone_population(WorldId::EMERALD, ZoneId::INDAR).await, 0);
        assert_eq!(tracker.zone_population(WorldId::EMERALD, ZoneId::HOSSIN).await, 0);
        assert!(tracker.online_outfit_members("o1").await.is_empty());
        assert_eq!(tracker.online_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_overtaking_resolution_prevents_registration() {
        let (tracker, _shutdown) = tracker(FakeResolver::with([character("c", None, FactionId::TR)]));

        tracker.handle_login(&login("c", 100));
        tracker.handle_logout(&logout("c", 105)).await;
        tracker.settle().await;

        assert!(!tracker.is_online("c").await);
        assert_eq!(tracker.missed_unregister_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_of_online_character_blocks_stale_resolution() {
        let (tracker, _shutdown) = tracker(FakeResolver::with([character("c", Some("o1"), FactionId::VS)]));
        tracker.handle_login(&login("c", 100));
        tracker.settle().await;
        assert!(tracker.is_online("c").await);

        // A second login whose resolution finishes after the logout.
        tracker.handle_login(&login("c", 150));
        tracker.handle_logout(&logout("c", 200)).await;
        assert_eq!(tracker.missed_unregister_count().await, 1);
        tracker.settle().await;

        assert!(!tracker.is_online("c").await);
        assert!(tracker.online_outfit_members("o1").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_applies_queued_logout_on_shutdown() {
        let (tracker, _loader_shutdown) = tracker(FakeResolver::with([character("c", None, FactionId::TR)]));
        let tracker = Arc::new(tracker);
        tracker.handle_login(&login("c", 100));
        tracker.settle().await;
        assert!(tracker.is_online("c").await);

        let bus: crate::publisher::Publisher<GameEvent> = crate::publisher::Publisher::new("events");
        let events = bus.subscribe(&EventKind::ALL, 16);
        bus.publish(&GameEvent::PlayerLogout(logout("c", 200)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        Arc::clone(&tracker).run(shutdown_rx, events).await;

        assert!(!tracker.is_online("c").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_login_logout_pairs_keep_last_state() {
        let (tracker, _shutdown) = tracker(FakeResolver::with([character("c", Some("o1"), FactionId::NC)]));

        tracker.handle_login(&login("c", 100));
        tracker.handle_login(&login("c", 101));
        tracker.settle().await;
        assert_eq!(tracker.online_count().await, 1);

        tracker.handle_logout(&logout("c", 110)).await;
        tracker.handle_logout(&logout("c", 111)).await;
        assert_eq!(tracker.online_count().await, 0);

        tracker.handle_login(&login("c", 120));
        tracker.settle().await;
        assert!(tracker.is_online("c").await);
        assert_eq!(tracker.online_outfit_members("o1").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolvable_character_stays_untracked() {
        let (tracker, _shutdown) = tracker(FakeResolver::default());
        tracker.handle_login(&login("ghost", 100));
        tracker.settle().await;
        assert_eq!(tracker.online_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_markers_expire_after_ttl() {
        let (tracker, _shutdown) = tracker(FakeResolver::default());
        tracker.handle_logout(&logout("c", 100)).await;
        assert_eq!(tracker.sweep_expired_markers().await, 0);

        tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(tracker.sweep_expired_markers().await, 1);
        assert_eq!(tracker.missed_unregister_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_population_read_models() {
        let (tracker, _shutdown) = tracker(FakeResolver::with([
            character("a", Some("o1"), FactionId::VS),
            character("b", Some("o2"), FactionId::TR),
        ]));
        tracker.handle_login(&login("a", 100));
        tracker.handle_login(&login("b", 100));
        tracker.settle().await;

        tracker.process(experience("a", ZoneId::INDAR)).await.unwrap();
        tracker.process(experience("b", ZoneId::INDAR)).await.unwrap();
        tracker.process(experience("x", ZoneId::AMERISH)).await.unwrap();

        let worlds = tracker.worlds_population().await;
        let emerald = &worlds[&WorldId::EMERALD];
        assert_eq!(emerald.total, 3);
        assert_eq!(emerald.zones[&ZoneId::INDAR], 2);

        let detail = tracker.detailed_world_population(WorldId::EMERALD).await;
        let indar = &detail.zones[&ZoneId::INDAR];
        assert_eq!(indar.factions[&FactionId::VS], 1);
        assert_eq!(indar.factions[&FactionId::TR], 1);
        assert_eq!(detail.zones[&ZoneId::AMERISH].unresolved, 1);

        let entities = tracker
            .trackable_online_entities(&TrackingSettings {
                outfits: vec!["o1".into(), "o3".into()],
                characters: vec!["b".into(), "x".into()],
            })
            .await;
        assert_eq!(entities.outfits["o1"].len(), 1);
        assert!(entities.outfits["o3"].is_empty());
        assert_eq!(entities.characters.len(), 1);
        assert_eq!(entities.characters[0].id, "b");
    }
}
