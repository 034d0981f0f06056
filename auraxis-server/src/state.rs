//! Application state shared by the runner tasks.

use auraxis_core::config::ConfigStore;
use auraxis_core::processors::{
    FacilityTracker, GetActiveAlerts, GetTrackableOnlineEntities, GetWorldTerritoryControl,
    GetWorldsPopulation, PresenceTracker, TrackingSettings,
};
use auraxis_sdk::objects::{FactionId, Platform, SubscriptionSettings};
use kanau::processor::Processor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Everything the signal handlers and the status reporter need.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub presence: Arc<PresenceTracker>,
    pub facilities: Arc<FacilityTracker>,
    /// Subscription filter per running connection. Can be reloaded via SIGHUP.
    pub subscriptions: Arc<HashMap<Platform, ConfigStore<SubscriptionSettings>>>,
    /// Outfits and characters the reporter lists. Can be reloaded via SIGHUP.
    pub tracking: ConfigStore<TrackingSettings>,
}

impl AppState {
    /// Log population, territory control, alerts and tracked entities.
    pub async fn report(&self) {
        let Ok(worlds) = self.presence.process(GetWorldsPopulation).await;
        for (world, population) in &worlds {
            info!(
                %world,
                name = world.name().unwrap_or("unknown"),
                online = population.total,
                "World population"
            );
        }

        for world in worlds.keys() {
            let Ok(Some(control)) = self
                .facilities
                .process(GetWorldTerritoryControl { world: *world })
                .await
            else {
                continue;
            };
            for (zone, zone_control) in &control.zones {
                if zone_control.facilities == 0 {
                    continue;
                }
                info!(
                    %world,
                    %zone,
                    vs = zone_control.percent(FactionId::VS),
                    nc = zone_control.percent(FactionId::NC),
                    tr = zone_control.percent(FactionId::TR),
                    "Territory control"
                );
            }
        }

        let Ok(alerts) = self.facilities.process(GetActiveAlerts).await;
        for alert in &alerts {
            info!(
                world = %alert.key.world,
                zone = %alert.key.zone,
                instance_id = %alert.key.instance_id,
                ends_at = %alert.ends_at(),
                "Alert running"
            );
        }

        let settings = self.tracking.snapshot().await;
        if settings.outfits.is_empty() && settings.characters.is_empty() {
            return;
        }
        let Ok(online) = self
            .presence
            .process(GetTrackableOnlineEntities { settings })
            .await;
        for (outfit_id, members) in &online.outfits {
            info!(%outfit_id, online = members.len(), "Tracked outfit");
        }
        for character in &online.characters {
            info!(character_id = %character.id, name = %character.name, "Tracked character online");
        }
    }

    /// Call [`report`](Self::report) on an interval until shutdown.
    pub async fn run_reporter(self, every: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = interval.tick() => {
                    self.report().await;
                }
            }
        }
    }
}
