//! TOML file configuration structures.
//!
//! These structs directly map to the `auraxis-config.toml` file format.

use auraxis_sdk::objects::Platform;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub census: CensusConfig,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
    #[serde(default)]
    pub suppressor: SuppressorConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// Census credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CensusConfig {
    /// The `s:` prefixed service id. Can be overridden from the command line
    /// or `CENSUS_SERVICE_ID`.
    pub service_id: Option<String>,
    /// Alternative REST host, e.g. a caching proxy.
    pub base_url: Option<String>,
}

/// One push connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub platform: Platform,
    /// World ids, or `"all"`. Defaults to the public worlds of the platform.
    #[serde(default)]
    pub worlds: Vec<CompactString>,
    /// Character ids, or `"all"`.
    #[serde(default = "default_characters")]
    pub characters: Vec<CompactString>,
    /// Event names. Defaults to every event the trackers understand.
    #[serde(default)]
    pub events: Vec<CompactString>,
    #[serde(default)]
    pub logical_and_characters_with_worlds: bool,
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
}

fn default_characters() -> Vec<CompactString> {
    vec![CompactString::const_new("all")]
}

fn default_inactivity_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressorConfig {
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

fn default_flush_interval_secs() -> u64 {
    5 * 60
}

impl Default for SuppressorConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_missed_unregister_ttl_secs")]
    pub missed_unregister_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_missed_unregister_ttl_secs() -> u64 {
    5 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            missed_unregister_ttl_secs: default_missed_unregister_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_alert_minutes")]
    pub default_duration_minutes: i64,
    /// Duration in minutes by metagame event id.
    #[serde(default)]
    pub durations: BTreeMap<String, i64>,
}

fn default_alert_minutes() -> i64 {
    90
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            default_duration_minutes: default_alert_minutes(),
            durations: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_batch_window_ms() -> u64 {
    50
}

fn default_max_batch() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    60 * 60
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: default_batch_window_ms(),
            max_batch: default_max_batch(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Outfits and characters to follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default)]
    pub outfits: Vec<CompactString>,
    #[serde(default)]
    pub characters: Vec<CompactString>,
    /// How often outfit rosters are polled.
    #[serde(default = "default_roster_interval_secs")]
    pub roster_interval_secs: u64,
    /// How often population and online tracked entities are logged.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

fn default_roster_interval_secs() -> u64 {
    10 * 60
}

fn default_report_interval_secs() -> u64 {
    60
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            outfits: Vec::new(),
            characters: Vec::new(),
            roster_interval_secs: default_roster_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[census]
service_id = "s:example"

[[streams]]
platform = "pc"
worlds = ["17", "1"]
events = ["PlayerLogin", "PlayerLogout"]

[[streams]]
platform = "ps4eu"

[suppressor]
flush_interval_secs = 120

[alerts]
default_duration_minutes = 45
[alerts.durations]
"147" = 90

[loader]
max_batch = 50

[tracking]
outfits = ["37509488620604883"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.census.service_id.as_deref(), Some("s:example"));
        assert_eq!(config.streams.len(), 2);
        assert_eq!(config.streams[0].platform, Platform::Pc);
        assert_eq!(config.streams[0].worlds, vec!["17", "1"]);
        assert_eq!(config.streams[1].platform, Platform::Ps4Eu);
        assert!(config.streams[1].worlds.is_empty());
        assert_eq!(config.streams[1].characters, vec!["all"]);
        assert_eq!(config.streams[1].inactivity_timeout_secs, 60);
        assert_eq!(config.suppressor.flush_interval_secs, 120);
        assert_eq!(config.alerts.default_duration_minutes, 45);
        assert_eq!(config.alerts.durations.get("147"), Some(&90));
        assert_eq!(config.loader.max_batch, 50);
        assert_eq!(config.loader.batch_window_ms, 50);
        assert_eq!(config.tracking.outfits.len(), 1);
        assert_eq!(config.tracking.roster_interval_secs, 600);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.census.service_id.is_none());
        assert!(config.streams.is_empty());
        assert_eq!(config.presence.missed_unregister_ttl_secs, 300);
        assert_eq!(config.alerts.sweep_interval_secs, 60);
        assert_eq!(config.loader.cache_ttl_secs, 3600);
    }
}
