//! FacilityTracker processor.
//!
//! The FacilityTracker is responsible for:
//! - Recording the current owner of every facility from `FacilityControl`
//! - Publishing `TrackerEvent::FacilityControl` and `TrackerEvent::FacilityLoss`
//!   when a facility changes faction
//! - Keeping the set of running alerts from `MetagameEvent`
//! - Evicting alerts whose window has elapsed
//!
//! Only world/zone pairs in the [`WorldTopology`] are tracked. Anything else
//! is logged at warn and ignored.

use crate::config::{AlertConfig, WorldTopology};
use crate::events::{FacilityChange, TrackerEvent};
use crate::publisher::{Publisher, Subscription};
use auraxis_sdk::objects::events::{FacilityControl, MetagameEvent};
use auraxis_sdk::objects::{FactionId, GameEvent, MetagameEventState, WorldId, ZoneId};
use compact_str::CompactString;
use kanau::processor::Processor;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Public data types
// ---------------------------------------------------------------------------

/// Current holder of a facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacilityOwner {
    pub outfit_id: Option<CompactString>,
    pub faction: FactionId,
    pub since: OffsetDateTime,
}

/// Identifies one alert. A zone can carry more than one metagame instance,
/// and a transition only touches the instance it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlertKey {
    pub world: WorldId,
    /// Zone definition.
    pub zone: ZoneId,
    pub instance_id: CompactString,
}

/// A running alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertWindow {
    pub key: AlertKey,
    pub metagame_event_id: Option<u32>,
    pub started_at: OffsetDateTime,
    pub duration: time::Duration,
}

impl AlertWindow {
    pub fn ends_at(&self) -> OffsetDateTime {
        self.started_at + self.duration
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.ends_at() < now
    }

    pub fn remaining(&self, now: OffsetDateTime) -> time::Duration {
        (self.ends_at() - now).max(time::Duration::ZERO)
    }
}

/// Facility counts of one zone by owning faction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ZoneControl {
    pub facilities: u32,
    pub factions: BTreeMap<FactionId, u32>,
}

impl ZoneControl {
    /// Share of the zone's known facilities held by `faction`, 0 to 100.
    pub fn percent(&self, faction: FactionId) -> f64 {
        if self.facilities == 0 {
            return 0.0;
        }
        let held = self.factions.get(&faction).copied().unwrap_or(0);
        f64::from(held) * 100.0 / f64::from(self.facilities)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerritoryControl {
    pub world: WorldId,
    pub zones: BTreeMap<ZoneId, ZoneControl>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
/// Alerts still running now.
pub struct GetActiveAlerts;

#[derive(Debug, Clone)]
/// Facility ownership summary of one world.
pub struct GetWorldTerritoryControl {
    pub world: WorldId,
}

// ---------------------------------------------------------------------------
// FacilityTracker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FacilityState {
    owners: HashMap<(WorldId, ZoneId), HashMap<CompactString, FacilityOwner>>,
    alerts: HashMap<AlertKey, AlertWindow>,
}

pub struct FacilityTracker {
    state: RwLock<FacilityState>,
    topology: WorldTopology,
    derived: Publisher<TrackerEvent>,
    config: AlertConfig,
}

fn event_time(raw: &str) -> OffsetDateTime {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

fn outfit_of(raw: &CompactString) -> Option<CompactString> {
    let id = raw.trim();
    (!id.is_empty() && id != "0").then(|| CompactString::from(id))
}

impl FacilityTracker {
    pub fn new(topology: WorldTopology, derived: Publisher<TrackerEvent>, config: AlertConfig) -> Self {
        let mut state = FacilityState::default();
        for pair in topology.pairs() {
            state.owners.insert(pair, HashMap::new());
        }
        Self {
            state: RwLock::new(state),
            topology,
            derived,
            config,
        }
    }

    fn locate(&self, world: &str, zone: &str, what: &'static str) -> Option<(WorldId, ZoneId)> {
        let (Ok(world_id), Ok(zone_id)) = (world.parse::<WorldId>(), zone.parse::<ZoneId>()) else {
            warn!(world, zone, what, "Event has malformed world or zone id");
            return None;
        };
        if !self.topology.contains(world_id, zone_id) {
            warn!(world = %world_id, zone = %zone_id, what, "Ignoring event for unknown world/zone");
            return None;
        }
        Some((world_id, zone_id))
    }

    /// Record a facility changing hands.
    ///
    /// Returns the change, or `None` for defenses and ignored events.
    pub async fn handle_facility_control(&self, event: &FacilityControl) -> Option<FacilityChange> {
        let (world, zone) = self.locate(&event.world_id, &event.zone_id, "FacilityControl")?;
        if event.is_defense() {
            debug!(facility_id = %event.facility_id, %world, "Facility defended");
            return None;
        }

        let timestamp = event_time(&event.timestamp);
        let outfit_id = outfit_of(&event.outfit_id);
        let new_faction = event.new_faction().unwrap_or(FactionId::NONE);
        let old_faction = event.old_faction().unwrap_or(FactionId::NONE);

        let previous = {
            let mut state = self.state.write().await;
            state.owners.entry((world, zone)).or_default().insert(
                event.facility_id.clone(),
                FacilityOwner {
                    outfit_id: outfit_id.clone(),
                    faction: new_faction,
                    since: timestamp,
                },
            )
        };

        let change = FacilityChange {
            world,
            zone,
            facility_id: event.facility_id.clone(),
            outfit_id,
            old_outfit_id: previous.and_then(|owner| owner.outfit_id),
            new_faction,
            old_faction,
            timestamp,
        };
        debug!(
            facility_id = %change.facility_id,
            %world,
            %zone,
            new_faction = new_faction.tag(),
            old_faction = old_faction.tag(),
            outfit_id = ?change.outfit_id,
            "Facility captured"
        );

        self.derived.publish(&TrackerEvent::FacilityControl(change.clone()));
        self.derived.publish(&TrackerEvent::FacilityLoss(change.clone()));
        Some(change)
    }

    /// Open an alert window on start, close it on any other transition.
    pub async fn handle_metagame_event(&self, event: &MetagameEvent) {
        let Some((world, zone)) = self.locate(&event.world_id, &event.zone_id, "MetagameEvent") else {
            return;
        };
        let key = AlertKey {
            world,
            zone: zone.definition(),
            instance_id: CompactString::from(event.instance_id.trim()),
        };
        let state_change = event.state();

        let mut state = self.state.write().await;
        if state_change == Some(MetagameEventState::Started) {
            let metagame_event_id = event.event_type();
            let window = AlertWindow {
                key: key.clone(),
                metagame_event_id,
                started_at: event_time(&event.timestamp),
                duration: self.config.duration_of(metagame_event_id),
            };
            info!(
                %world,
                %zone,
                instance_id = %key.instance_id,
                metagame_event_id = ?metagame_event_id,
                "Alert started"
            );
            state.alerts.insert(key, window);
        } else if state.alerts.remove(&key).is_some() {
            info!(%world, %zone, instance_id = %key.instance_id, state = ?state_change, "Alert finished");
        } else {
            debug!(
                %world,
                %zone,
                instance_id = %key.instance_id,
                state = ?state_change,
                "Metagame transition for untracked alert"
            );
        }
    }

    // -- Reads --------------------------------------------------------------

    /// Alerts that have not run past their window at `now`.
    pub async fn alerts_at(&self, now: OffsetDateTime) -> Vec<AlertWindow> {
        let state = self.state.read().await;
        let mut alerts: Vec<AlertWindow> = state
            .alerts
            .values()
            .filter(|window| !window.is_expired(now))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.key.cmp(&b.key));
        alerts
    }

    pub async fn alerts(&self) -> Vec<AlertWindow> {
        self.alerts_at(OffsetDateTime::now_utc()).await
    }

    pub async fn facility_owner(
        &self,
        world: WorldId,
        zone: ZoneId,
        facility_id: &str,
    ) -> Option<FacilityOwner> {
        self.state
            .read()
            .await
            .owners
            .get(&(world, zone))
            .and_then(|facilities| facilities.get(facility_id))
            .cloned()
    }

    /// `None` for worlds outside the topology.
    pub async fn world_territory_control(&self, world: WorldId) -> Option<TerritoryControl> {
        if !self.topology.contains_world(world) {
            return None;
        }
        let state = self.state.read().await;
        let mut zones: BTreeMap<ZoneId, ZoneControl> = BTreeMap::new();
        for ((w, zone), facilities) in &state.owners {
            if *w != world {
                continue;
            }
            let control = zones.entry(*zone).or_default();
            for owner in facilities.values() {
                control.facilities += 1;
                *control.factions.entry(owner.faction).or_default() += 1;
            }
        }
        Some(TerritoryControl { world, zones })
    }

    // -- Maintenance --------------------------------------------------------

    /// Remove alerts whose window elapsed before `now`.
    pub async fn sweep_expired_alerts(&self, now: OffsetDateTime) -> usize {
        let mut state = self.state.write().await;
        let before = state.alerts.len();
        state.alerts.retain(|_, window| !window.is_expired(now));
        before - state.alerts.len()
    }

    pub async fn run(
        self: Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
        mut events: Subscription<GameEvent>,
    ) {
        info!(
            sweep_interval = ?self.config.sweep_interval,
            "FacilityTracker started"
        );

        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sweep.tick().await;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("FacilityTracker received shutdown signal");
                        break;
                    }
                }

                Some(event) = events.recv() => {
                    let _ = self.process(event).await;
                }

                _ = sweep.tick() => {
                    let expired = self.sweep_expired_alerts(OffsetDateTime::now_utc()).await;
                    if expired > 0 {
                        debug!(expired, "Evicted expired alerts");
                    }
                }

                else => {
                    info!("Event subscription closed");
                    break;
                }
            }
        }

        // Events published before the shutdown still count.
        let mut drained = 0usize;
        while let Some(event) = events.try_recv() {
            let _ = self.process(event).await;
            drained += 1;
        }
        info!(drained, "FacilityTracker shutdown complete");
    }
}

impl Processor<GameEvent> for FacilityTracker {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, event: GameEvent) -> Result<(), Infallible> {
        match &event {
            GameEvent::FacilityControl(control) => {
                self.handle_facility_control(control).await;
            }
            GameEvent::MetagameEvent(metagame) => self.handle_metagame_event(metagame).await,
            _ => {}
        }
        Ok(())
    }
}

impl Processor<GetActiveAlerts> for FacilityTracker {
    type Output = Vec<AlertWindow>;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Facility:GetActiveAlerts")]
    async fn process(&self, _query: GetActiveAlerts) -> Result<Vec<AlertWindow>, Infallible> {
        Ok(self.alerts().await)
    }
}

impl Processor<GetWorldTerritoryControl> for FacilityTracker {
    type Output = Option<TerritoryControl>;
    type Error = Infallible;
    #[tracing::instrument(skip_all, name = "Facility:GetWorldTerritoryControl")]
    async fn process(
        &self,
        query: GetWorldTerritoryControl,
    ) -> Result<Option<TerritoryControl>, Infallible> {
        Ok(self.world_territory_control(query.world).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TrackerEventKind;
    use auraxis_sdk::objects::{EventKind, Platform};

    const T0: i64 = 1_700_000_000;

    fn tracker() -> (FacilityTracker, Subscription<TrackerEvent>) {
        let derived = Publisher::new("derived");
        let sub = derived.subscribe(&TrackerEventKind::ALL, 16);
        let tracker = FacilityTracker::new(
            WorldTopology::for_platforms(&[Platform::Pc]),
            derived,
            AlertConfig::default(),
        );
        (tracker, sub)
    }

    fn capture(facility: &str, outfit: &str, old: FactionId, new: FactionId) -> FacilityControl {
        FacilityControl {
            facility_id: facility.into(),
            outfit_id: outfit.into(),
            new_faction_id: new.to_string().into(),
            old_faction_id: old.to_string().into(),
            duration_held: "600".into(),
            world_id: "10".into(),
            zone_id: "2".into(),
            timestamp: T0.to_string().into(),
        }
    }

    fn metagame(state: &str, world: &str, zone: &str) -> MetagameEvent {
        metagame_instance(state, world, zone, "12345")
    }

    fn metagame_instance(state: &str, world: &str, zone: &str, instance: &str) -> MetagameEvent {
        MetagameEvent {
            instance_id: instance.into(),
            metagame_event_id: "147".into(),
            metagame_event_state: "".into(),
            metagame_event_state_name: state.into(),
            experience_bonus: "25.0".into(),
            faction_nc: "33".into(),
            faction_tr: "33".into(),
            faction_vs: "34".into(),
            world_id: world.into(),
            zone_id: zone.into(),
            timestamp: T0.to_string().into(),
        }
    }

    #[tokio::test]
    async fn test_defense_changes_nothing() {
        let (tracker, mut sub) = tracker();
        let change = tracker
            .handle_facility_control(&capture("1", "42", FactionId::VS, FactionId::VS))
            .await;
        assert!(change.is_none());
        assert!(tracker.facility_owner(WorldId::MILLER, ZoneId::INDAR, "1").await.is_none());
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_capture_emits_control_and_loss_with_previous_owner() {
        let (tracker, mut sub) = tracker();
        tracker
            .handle_facility_control(&capture("1", "111", FactionId::VS, FactionId::NC))
            .await;
        assert!(matches!(sub.try_recv(), Some(TrackerEvent::FacilityControl(c)) if c.old_outfit_id.is_none()));
        assert!(matches!(sub.try_recv(), Some(TrackerEvent::FacilityLoss(_))));

        tracker
            .handle_facility_control(&capture("1", "222", FactionId::NC, FactionId::TR))
            .await;
        let owner = tracker
            .facility_owner(WorldId::MILLER, ZoneId::INDAR, "1")
            .await
            .unwrap();
        assert_eq!(owner.outfit_id.as_deref(), Some("222"));
        assert_eq!(owner.faction, FactionId::TR);

        let Some(TrackerEvent::FacilityControl(control)) = sub.try_recv() else {
            panic!("expected FacilityControl");
        };
        let Some(TrackerEvent::FacilityLoss(loss)) = sub.try_recv() else {
            panic!("expected FacilityLoss");
        };
        assert_eq!(control.old_outfit_id.as_deref(), Some("111"));
        assert_eq!(loss.old_outfit_id.as_deref(), Some("111"));
        assert_eq!(control.outfit_id.as_deref(), Some("222"));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unknown_world_is_ignored() {
        let (tracker, mut sub) = tracker();
        let mut event = capture("1", "42", FactionId::VS, FactionId::NC);
        event.world_id = "2000".into();
        assert!(tracker.handle_facility_control(&event).await.is_none());
        assert!(sub.try_recv().is_none());

        tracker.handle_metagame_event(&metagame("started", "999", "2")).await;
        assert!(tracker.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_alert_window_expires_at_read_time() {
        let (tracker, _sub) = tracker();
        tracker.handle_metagame_event(&metagame("started", "10", "6")).await;

        let start = OffsetDateTime::from_unix_timestamp(T0).unwrap();
        let at_89 = tracker.alerts_at(start + time::Duration::minutes(89)).await;
        assert_eq!(at_89.len(), 1);
        assert_eq!(at_89[0].key.zone, ZoneId::AMERISH);
        assert_eq!(at_89[0].metagame_event_id, Some(147));
        assert!(tracker.alerts_at(start + time::Duration::minutes(91)).await.is_empty());

        assert_eq!(tracker.sweep_expired_alerts(start + time::Duration::minutes(89)).await, 0);
        assert_eq!(tracker.sweep_expired_alerts(start + time::Duration::minutes(91)).await, 1);
    }

    #[tokio::test]
    async fn test_alert_removed_on_end() {
        let (tracker, _sub) = tracker();
        let start = OffsetDateTime::from_unix_timestamp(T0).unwrap();
        tracker.handle_metagame_event(&metagame("started", "10", "6")).await;
        tracker.handle_metagame_event(&metagame("started", "10", "2")).await;
        tracker.handle_metagame_event(&metagame("ended", "10", "6")).await;

        let alerts = tracker.alerts_at(start).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key.zone, ZoneId::INDAR);
    }

    #[tokio::test]
    async fn test_end_of_other_instance_keeps_alert() {
        let (tracker, _sub) = tracker();
        let start = OffsetDateTime::from_unix_timestamp(T0).unwrap();
        tracker
            .handle_metagame_event(&metagame_instance("started", "10", "2", "100"))
            .await;
        tracker
            .handle_metagame_event(&metagame_instance("ended", "10", "2", "99"))
            .await;

        let alerts = tracker.alerts_at(start).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key.instance_id, "100");

        tracker
            .handle_metagame_event(&metagame_instance("ended", "10", "2", "100"))
            .await;
        assert!(tracker.alerts_at(start).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_instances_in_one_zone() {
        let (tracker, _sub) = tracker();
        let start = OffsetDateTime::from_unix_timestamp(T0).unwrap();
        tracker
            .handle_metagame_event(&metagame_instance("started", "10", "2", "100"))
            .await;
        tracker
            .handle_metagame_event(&metagame_instance("started", "10", "2", "101"))
            .await;

        let alerts = tracker.alerts_at(start).await;
        let instances: Vec<&str> = alerts.iter().map(|a| a.key.instance_id.as_str()).collect();
        assert_eq!(instances, vec!["100", "101"]);
    }

    #[tokio::test]
    async fn test_run_applies_queued_events_on_shutdown() {
        let bus: Publisher<GameEvent> = Publisher::new("events");
        let events = bus.subscribe(&[EventKind::FacilityControl, EventKind::MetagameEvent], 16);
        let (tracker, _sub) = tracker();
        let tracker = Arc::new(tracker);

        bus.publish(&GameEvent::MetagameEvent(metagame("started", "10", "6")));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();
        Arc::clone(&tracker).run(shutdown_rx, events).await;

        let start = OffsetDateTime::from_unix_timestamp(T0).unwrap();
        assert_eq!(tracker.alerts_at(start).await.len(), 1);
    }

    #[tokio::test]
    async fn test_configured_alert_duration() {
        let derived = Publisher::new("derived");
        let mut config = AlertConfig::default();
        config.durations.insert(147, time::Duration::minutes(30));
        let tracker = FacilityTracker::new(WorldTopology::for_platforms(&[Platform::Pc]), derived, config);
        tracker.handle_metagame_event(&metagame("started", "10", "6")).await;

        let start = OffsetDateTime::from_unix_timestamp(T0).unwrap();
        assert!(tracker.alerts_at(start + time::Duration::minutes(31)).await.is_empty());
    }

    #[tokio::test]
    async fn test_territory_control() {
        let (tracker, _sub) = tracker();
        tracker
            .handle_facility_control(&capture("1", "0", FactionId::VS, FactionId::NC))
            .await;
        tracker
            .handle_facility_control(&capture("2", "0", FactionId::VS, FactionId::NC))
            .await;
        tracker
            .handle_facility_control(&capture("3", "0", FactionId::NC, FactionId::TR))
            .await;
        tracker
            .handle_facility_control(&capture("4", "0", FactionId::NC, FactionId::VS))
            .await;

        let control = tracker.world_territory_control(WorldId::MILLER).await.unwrap();
        let indar = &control.zones[&ZoneId::INDAR];
        assert_eq!(indar.facilities, 4);
        assert_eq!(indar.percent(FactionId::NC), 50.0);
        assert_eq!(indar.percent(FactionId::TR), 25.0);
        assert_eq!(control.zones[&ZoneId::HOSSIN].facilities, 0);
        assert!(tracker.world_territory_control(WorldId(999)).await.is_none());
    }
}
