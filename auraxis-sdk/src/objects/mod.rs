pub mod character;
pub mod events;
pub mod messages;
pub mod subscription;
pub mod world;

pub use character::{Character, OutfitRef};
pub use events::{EventKind, GameEvent, MetagameEventState};
pub use messages::{MessageKind, ServerMessage};
pub use subscription::{Command, SubscriptionSettings};
pub use world::{FactionId, Platform, WorldId, ZoneId};
