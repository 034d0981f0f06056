//! Runtime configuration types.
//!
//! These types represent the validated runtime configuration used by the
//! processors. Loading and parsing the config file is handled by the server
//! crate.

mod config_store;
mod topology;
mod trackers;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use topology::WorldTopology;
pub use trackers::{AlertConfig, LoaderConfig, OutfitSyncConfig, PresenceConfig, SuppressorConfig};
