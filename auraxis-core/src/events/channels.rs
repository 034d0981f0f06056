//! Channel factories and shared publishers.

use super::types::TrackerEvent;
use crate::publisher::Publisher;
use auraxis_sdk::objects::{GameEvent, ServerMessage};
use tokio::sync::mpsc;

/// Default buffer size for event channels and subscriber queues.
///
/// This provides enough buffer to handle bursts while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Frames from a busy world arrive in bursts, so the raw queue is deeper.
pub const FRAME_CHANNEL_BUFFER: usize = 4096;

/// Sender handle for raw JSON frames read off a push connection.
pub type FrameSender = mpsc::Sender<serde_json::Value>;
/// Receiver handle for raw JSON frames.
pub type FrameReceiver = mpsc::Receiver<serde_json::Value>;

/// Create a raw frame channel.
///
/// Each streaming connection gets its own channel so events from one
/// platform keep their order.
pub fn frame_channel() -> (FrameSender, FrameReceiver) {
    mpsc::channel(FRAME_CHANNEL_BUFFER)
}

/// All publishers of the pipeline.
///
/// - `messages`: every decoded server message, keyed by message kind.
/// - `raw_events`: game events straight from the decoder.
/// - `events`: game events after re-login suppression. Trackers read here.
/// - `derived`: tracker output.
#[derive(Clone)]
pub struct EventBus {
    pub messages: Publisher<ServerMessage>,
    pub raw_events: Publisher<GameEvent>,
    pub events: Publisher<GameEvent>,
    pub derived: Publisher<TrackerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            messages: Publisher::new("messages"),
            raw_events: Publisher::new("raw_events"),
            events: Publisher::new("events"),
            derived: Publisher::new("derived"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
