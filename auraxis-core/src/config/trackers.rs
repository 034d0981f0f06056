//! Runtime settings of the pipeline processors.

use compact_str::CompactString;
use std::collections::HashMap;
use std::time::Duration;

/// Re-login flicker suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressorConfig {
    /// How long a logout is held back waiting for a re-login.
    pub flush_interval: Duration,
}

impl Default for SuppressorConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Presence & population tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceConfig {
    /// How long the marker every logout leaves behind keeps blocking a
    /// resolution for an older login of the same character.
    pub missed_unregister_ttl: Duration,
    /// How often expired missed-unregister markers are dropped.
    pub sweep_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            missed_unregister_ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Facility ownership & alert tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    pub sweep_interval: Duration,
    /// Duration assumed for alerts without an entry in `durations`.
    pub default_duration: time::Duration,
    /// Alert duration by metagame event id.
    pub durations: HashMap<u32, time::Duration>,
}

impl AlertConfig {
    pub fn duration_of(&self, metagame_event_id: Option<u32>) -> time::Duration {
        metagame_event_id
            .and_then(|id| self.durations.get(&id).copied())
            .unwrap_or(self.default_duration)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            default_duration: time::Duration::minutes(90),
            durations: HashMap::new(),
        }
    }
}

/// Batched, cached identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Requests arriving within this window share one lookup.
    pub batch_window: Duration,
    /// A batch reaching this size is sent without waiting for the window.
    pub max_batch: usize,
    pub cache_ttl: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_window: Duration::from_millis(50),
            max_batch: 100,
            cache_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Outfit roster polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutfitSyncConfig {
    pub interval: Duration,
    pub outfits: Vec<CompactString>,
}

impl Default for OutfitSyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            outfits: Vec::new(),
        }
    }
}
