//! Event system for the ingestion pipeline.
//!
//! # Event Flow
//!
//! 1. `StreamingClient` pushes raw frames -> `MessageDecoder`
//! 2. `MessageDecoder` publishes `ServerMessage` on `messages` and game
//!    events on `raw_events`
//! 3. `ReloginSuppressor` forwards `raw_events` to `events`, holding back
//!    logouts that are immediately followed by a login
//! 4. `PresenceTracker` and `FacilityTracker` consume `events`;
//!    `FacilityTracker` and `OutfitMembersSynchronizer` publish
//!    `TrackerEvent` on `derived`
//!
//! Delivery is at-most-once: overflowing subscriber queues drop events.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, EventBus, FRAME_CHANNEL_BUFFER, FrameReceiver, FrameSender,
    frame_channel,
};

pub use types::{FacilityChange, MembersDiff, TrackerEvent, TrackerEventKind};
