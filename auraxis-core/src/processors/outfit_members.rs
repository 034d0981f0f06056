//! OutfitMembersSynchronizer processor.
//!
//! Polls the rosters of the tracked outfits and publishes
//! `TrackerEvent::OutfitMembersUpdate` whenever the member set changed since
//! the previous poll. The first successful poll of an outfit only records a
//! baseline.

use super::character_loader::ResolveError;
use crate::config::OutfitSyncConfig;
use crate::events::{MembersDiff, TrackerEvent};
use crate::publisher::Publisher;
use async_trait::async_trait;
use compact_str::CompactString;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Source of outfit rosters.
#[async_trait]
pub trait OutfitMembersLoader: Send + Sync {
    async fn outfit_member_ids(&self, outfit_id: &str) -> Result<Vec<CompactString>, ResolveError>;
}

pub struct OutfitMembersSynchronizer {
    loader: Arc<dyn OutfitMembersLoader>,
    derived: Publisher<TrackerEvent>,
    config: OutfitSyncConfig,
    snapshots: HashMap<CompactString, BTreeSet<CompactString>>,
}

impl OutfitMembersSynchronizer {
    pub fn new(
        loader: Arc<dyn OutfitMembersLoader>,
        derived: Publisher<TrackerEvent>,
        config: OutfitSyncConfig,
    ) -> Self {
        Self {
            loader,
            derived,
            config,
            snapshots: HashMap::new(),
        }
    }

    /// Poll every tracked outfit once. Returns the number of updates published.
    pub async fn sync_once(&mut self) -> usize {
        let mut published = 0;
        for outfit_id in self.config.outfits.clone() {
            let members = match self.loader.outfit_member_ids(&outfit_id).await {
                Ok(members) => members.into_iter().collect::<BTreeSet<_>>(),
                Err(e) => {
                    warn!(%outfit_id, error = %e, "Failed to load outfit roster");
                    continue;
                }
            };

            let Some(previous) = self.snapshots.insert(outfit_id.clone(), members) else {
                debug!(%outfit_id, "Recorded outfit roster baseline");
                continue;
            };
            let Some(current) = self.snapshots.get(&outfit_id) else {
                continue;
            };
            let diff = MembersDiff::between(&previous, current);
            if diff.is_empty() {
                continue;
            }

            info!(
                %outfit_id,
                joined = diff.joined.len(),
                left = diff.left.len(),
                "Outfit roster changed"
            );
            self.derived
                .publish(&TrackerEvent::OutfitMembersUpdate { outfit_id, diff });
            published += 1;
        }
        published
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        if self.config.outfits.is_empty() {
            info!("No outfits to synchronize, OutfitMembersSynchronizer idle");
        } else {
            info!(
                outfits = self.config.outfits.len(),
                interval = ?self.config.interval,
                "OutfitMembersSynchronizer started"
            );
        }

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("OutfitMembersSynchronizer received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    self.sync_once().await;
                }
            }
        }

        info!("OutfitMembersSynchronizer shutdown complete");
    }
}
