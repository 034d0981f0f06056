//! Log output for service state and derived tracker events.

use auraxis_core::events::{TrackerEvent, TrackerEventKind};
use auraxis_core::publisher::{Publisher, Subscription, Unsubscribe};
use auraxis_sdk::objects::{MessageKind, ServerMessage};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Log connection and upstream endpoint state changes.
pub fn watch_service_state(messages: &Publisher<ServerMessage>) -> Unsubscribe<ServerMessage> {
    messages.add_handler(
        &[
            MessageKind::ConnectionStateChanged,
            MessageKind::ServiceStateChanged,
            MessageKind::Heartbeat,
            MessageKind::Subscription,
        ],
        |message| {
            match message {
                ServerMessage::ConnectionStateChanged(state) => {
                    info!(connected = state.is_connected(), "Push connection state changed");
                }
                ServerMessage::ServiceStateChanged(state) if state.is_online() => {
                    info!(endpoint = %state.detail, "Event server online");
                }
                ServerMessage::ServiceStateChanged(state) => {
                    warn!(endpoint = %state.detail, "Event server offline");
                }
                ServerMessage::Heartbeat(heartbeat) => {
                    for endpoint in heartbeat.offline_endpoints() {
                        debug!(%endpoint, "Heartbeat reports endpoint offline");
                    }
                }
                ServerMessage::Subscription(echo) => {
                    info!(
                        worlds = echo.worlds.len(),
                        events = echo.event_names.len(),
                        characters = echo.character_count,
                        "Subscription confirmed"
                    );
                }
                _ => {}
            }
            Ok(())
        },
    )
}

pub fn log_tracker_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::FacilityControl(change) => info!(
            world = %change.world,
            zone = %change.zone,
            facility_id = %change.facility_id,
            outfit_id = ?change.outfit_id,
            faction = change.new_faction.tag(),
            "Facility captured"
        ),
        TrackerEvent::FacilityLoss(change) => info!(
            world = %change.world,
            zone = %change.zone,
            facility_id = %change.facility_id,
            outfit_id = ?change.old_outfit_id,
            faction = change.old_faction.tag(),
            "Facility lost"
        ),
        TrackerEvent::OutfitMembersUpdate { outfit_id, diff } => info!(
            %outfit_id,
            joined = ?diff.joined,
            left = ?diff.left,
            "Outfit members changed"
        ),
    }
}

/// Subscribe to every derived event kind.
pub fn subscribe_tracker_events(derived: &Publisher<TrackerEvent>) -> Subscription<TrackerEvent> {
    derived.subscribe(
        &TrackerEventKind::ALL,
        auraxis_core::events::DEFAULT_CHANNEL_BUFFER,
    )
}

/// Log derived events until shutdown.
pub async fn run_tracker_log(
    mut events: Subscription<TrackerEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            Some(event) = events.recv() => log_tracker_event(&event),

            else => break,
        }
    }
}
