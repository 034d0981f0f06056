//! ReloginSuppressor processor.
//!
//! The push service frequently reports a logout immediately followed by a
//! login for the same character (zoning, client hiccups). Forwarding both
//! would flap presence state and spam consumers. The suppressor:
//! - Holds every `PlayerLogout` in a batch instead of forwarding it
//! - Drops a `PlayerLogin` together with the held logout when one exists
//! - Publishes logouts still held at the next periodic flush as genuine
//! - Forwards every other event immediately
//!
//! A login with nothing held is forwarded, so reordering fails open.
//!
//! A flush can release far more logouts than a subscriber queue holds, so
//! it publishes with [`Publisher::publish_wait`] outside the batch lock.
//! Logins arriving for a character whose logout is still being released
//! are deferred until the release finishes, keeping each character's
//! events in order downstream.

use crate::config::SuppressorConfig;
use crate::publisher::{Publisher, Unsubscribe};
use auraxis_sdk::objects::events::PlayerLogout;
use auraxis_sdk::objects::{EventKind, GameEvent};
use compact_str::CompactString;
use kanau::processor::Processor;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Default)]
struct Batch {
    pending: HashMap<CompactString, PlayerLogout>,
    /// Characters whose logout a running flush has not published yet.
    releasing: HashSet<CompactString>,
    deferred: Vec<GameEvent>,
}

pub struct ReloginSuppressor {
    batch: Mutex<Batch>,
    downstream: Publisher<GameEvent>,
    config: SuppressorConfig,
}

impl ReloginSuppressor {
    pub fn new(downstream: Publisher<GameEvent>, config: SuppressorConfig) -> Self {
        Self {
            batch: Mutex::new(Batch::default()),
            downstream,
            config,
        }
    }

    /// Register on every event kind of `upstream`.
    pub fn attach(self: &Arc<Self>, upstream: &Publisher<GameEvent>) -> Unsubscribe<GameEvent> {
        let this = Arc::clone(self);
        upstream.add_handler(&EventKind::ALL, move |event| {
            this.handle(event);
            Ok(())
        })
    }

    /// Route one event.
    pub fn handle(&self, event: &GameEvent) {
        let mut batch = self.batch.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            GameEvent::PlayerLogout(logout) => {
                debug!(character_id = %logout.character_id, "Holding back logout");
                batch
                    .pending
                    .insert(logout.character_id.clone(), logout.clone());
            }
            GameEvent::PlayerLogin(login) => {
                if batch.pending.remove(&login.character_id).is_some() {
                    debug!(character_id = %login.character_id, "Suppressed re-login");
                    return;
                }
                if batch.releasing.contains(&login.character_id) {
                    debug!(character_id = %login.character_id, "Deferring login behind release");
                    batch.deferred.push(event.clone());
                    return;
                }
                self.downstream.publish(event);
            }
            _ => {
                self.downstream.publish(event);
            }
        }
    }

    /// Publish every held logout, oldest first, waiting for room in
    /// subscriber queues. Returns how many were released.
    pub async fn flush(&self) -> usize {
        let mut released: Vec<PlayerLogout> = {
            let mut batch = self.batch.lock().unwrap_or_else(PoisonError::into_inner);
            let released: Vec<PlayerLogout> = batch.pending.drain().map(|(_, v)| v).collect();
            batch
                .releasing
                .extend(released.iter().map(|l| l.character_id.clone()));
            released
        };
        released.sort_by(|a, b| {
            logout_time(a)
                .cmp(&logout_time(b))
                .then_with(|| a.character_id.cmp(&b.character_id))
        });

        let count = released.len();
        for logout in released {
            self.downstream
                .publish_wait(&GameEvent::PlayerLogout(logout))
                .await;
        }

        let deferred = {
            let mut batch = self.batch.lock().unwrap_or_else(PoisonError::into_inner);
            batch.releasing.clear();
            std::mem::take(&mut batch.deferred)
        };
        for event in deferred {
            self.downstream.publish_wait(&event).await;
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.batch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }

    /// Flush on an interval until shutdown. Held logouts are released once
    /// more on the way out so consumers see every genuine logout.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            flush_interval = ?self.config.flush_interval,
            "ReloginSuppressor started"
        );

        let mut interval = tokio::time::interval(self.config.flush_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("ReloginSuppressor received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    let released = self.flush().await;
                    if released > 0 {
                        debug!(released, "Flushed held logouts");
                    }
                }
            }
        }

        let released = self.flush().await;
        info!(released, "ReloginSuppressor shutdown complete");
    }
}

fn logout_time(logout: &PlayerLogout) -> i64 {
    logout.timestamp.parse().unwrap_or(0)
}

impl Processor<GameEvent> for ReloginSuppressor {
    type Output = ();
    type Error = Infallible;

    async fn process(&self, event: GameEvent) -> Result<(), Infallible> {
        self.handle(&event);
        Ok(())
    }
}
