//! Configuration module for auraxis-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables, and converts it into the runtime config types
//! of `auraxis-core`.

pub mod file;

use crate::config::file::{FileConfig, StreamConfig as FileStreamConfig};
use auraxis_core::config::{
    AlertConfig, LoaderConfig, OutfitSyncConfig, PresenceConfig, SuppressorConfig, WorldTopology,
};
use auraxis_core::processors::TrackingSettings;
use auraxis_sdk::objects::subscription::ALL;
use auraxis_sdk::objects::{EventKind, Platform, SubscriptionSettings, WorldId, ZoneId};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("no Census service id: set census.service_id, --service-id or CENSUS_SERVICE_ID")]
    MissingServiceId,
}

/// Runtime settings of one push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    pub platform: Platform,
    pub subscription: SubscriptionSettings,
    pub inactivity_timeout: Duration,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub service_id: String,
    pub census_base_url: Option<String>,
    pub streams: Vec<StreamSettings>,
    pub topology: WorldTopology,
    pub suppressor: SuppressorConfig,
    pub presence: PresenceConfig,
    pub alerts: AlertConfig,
    pub loader: LoaderConfig,
    pub outfit_sync: OutfitSyncConfig,
    pub tracking: TrackingSettings,
    pub report_interval: Duration,
}

impl LoadedConfig {
    pub fn platforms(&self) -> Vec<Platform> {
        self.streams.iter().map(|s| s.platform).collect()
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    service_id_override: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, service_id_override: Option<String>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            service_id_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate and convert every section
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        self.build(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn build(&self, file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        let service_id = self
            .service_id_override
            .clone()
            .or(file_config.census.service_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or(ConfigError::MissingServiceId)?;

        if file_config.streams.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[streams]] entry is required".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut topology = WorldTopology::new();
        let mut streams = Vec::with_capacity(file_config.streams.len());
        for stream in &file_config.streams {
            if !seen.insert(stream.platform) {
                return Err(ConfigError::ValidationError(format!(
                    "platform {} is configured more than once",
                    stream.platform
                )));
            }
            let worlds = stream_worlds(stream)?;
            for world in &worlds {
                topology.add_world(*world, ZoneId::CONTINENTS);
            }
            streams.push(convert_stream(stream, &worlds)?);
        }

        if file_config.loader.max_batch == 0 {
            return Err(ConfigError::ValidationError(
                "loader.max_batch must be at least 1".into(),
            ));
        }

        let mut durations = HashMap::new();
        for (id, minutes) in &file_config.alerts.durations {
            let id = id.parse::<u32>().map_err(|_| {
                ConfigError::ValidationError(format!("invalid metagame event id {id:?}"))
            })?;
            durations.insert(id, time::Duration::minutes(*minutes));
        }

        Ok(LoadedConfig {
            service_id,
            census_base_url: file_config.census.base_url,
            streams,
            topology,
            suppressor: SuppressorConfig {
                flush_interval: secs(file_config.suppressor.flush_interval_secs),
            },
            presence: PresenceConfig {
                missed_unregister_ttl: secs(file_config.presence.missed_unregister_ttl_secs),
                sweep_interval: secs(file_config.presence.sweep_interval_secs),
            },
            alerts: AlertConfig {
                sweep_interval: secs(file_config.alerts.sweep_interval_secs),
                default_duration: time::Duration::minutes(
                    file_config.alerts.default_duration_minutes,
                ),
                durations,
            },
            loader: LoaderConfig {
                batch_window: Duration::from_millis(file_config.loader.batch_window_ms),
                max_batch: file_config.loader.max_batch,
                cache_ttl: secs(file_config.loader.cache_ttl_secs),
            },
            outfit_sync: OutfitSyncConfig {
                interval: secs(file_config.tracking.roster_interval_secs),
                outfits: file_config.tracking.outfits.clone(),
            },
            tracking: TrackingSettings {
                outfits: file_config.tracking.outfits,
                characters: file_config.tracking.characters,
            },
            report_interval: secs(file_config.tracking.report_interval_secs),
        })
    }
}

/// Intervals of zero would make `tokio::time::interval` panic.
fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

fn stream_worlds(stream: &FileStreamConfig) -> Result<Vec<WorldId>, ConfigError> {
    if stream.worlds.is_empty() || stream.worlds.iter().any(|w| w.as_str() == ALL) {
        return Ok(stream.platform.default_worlds().to_vec());
    }
    stream
        .worlds
        .iter()
        .map(|w| {
            w.parse::<WorldId>()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))
        })
        .collect()
}

fn convert_stream(
    stream: &FileStreamConfig,
    worlds: &[WorldId],
) -> Result<StreamSettings, ConfigError> {
    let kinds = if stream.events.is_empty() {
        EventKind::ALL.to_vec()
    } else {
        stream
            .events
            .iter()
            .map(|name| {
                name.parse::<EventKind>()
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut subscription = SubscriptionSettings::for_worlds(worlds, &kinds);
    subscription.characters = stream.characters.clone();
    subscription.logical_and_characters_with_worlds = stream.logical_and_characters_with_worlds;
    if subscription.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "stream {} subscribes to nothing",
            stream.platform
        )));
    }

    Ok(StreamSettings {
        platform: stream.platform,
        subscription,
        inactivity_timeout: secs(stream.inactivity_timeout_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(override_id: Option<&str>) -> ConfigLoader {
        ConfigLoader::new("unused.toml", override_id.map(str::to_owned))
    }

    fn parse(toml_str: &str) -> FileConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_build_defaults_to_platform_worlds_and_all_events() {
        let config = loader(None)
            .build(parse(
                r#"
[census]
service_id = "s:example"

[[streams]]
platform = "pc"
"#,
            ))
            .unwrap();

        assert_eq!(config.streams.len(), 1);
        let stream = &config.streams[0];
        assert_eq!(stream.subscription.worlds.len(), Platform::Pc.default_worlds().len());
        assert_eq!(stream.subscription.event_names.len(), EventKind::ALL.len());
        assert!(config.topology.contains(WorldId::EMERALD, ZoneId::INDAR));
        assert_eq!(config.suppressor.flush_interval, Duration::from_secs(300));
        assert_eq!(config.alerts.default_duration, time::Duration::minutes(90));
        assert_eq!(config.loader, LoaderConfig::default());
    }

    #[test]
    fn test_service_id_override_wins() {
        let config = loader(Some("s:cli"))
            .build(parse(
                r#"
[census]
service_id = "s:file"

[[streams]]
platform = "ps4us"
worlds = ["1000"]
events = ["FacilityControl", "MetagameEvent"]
"#,
            ))
            .unwrap();
        assert_eq!(config.service_id, "s:cli");
        assert_eq!(config.streams[0].subscription.worlds, vec!["1000"]);
        assert!(config.topology.contains_world(WorldId(1000)));
        assert!(!config.topology.contains_world(WorldId::EMERALD));
    }

    #[test]
    fn test_missing_service_id() {
        let result = loader(None).build(parse("[[streams]]\nplatform = \"pc\"\n"));
        assert!(matches!(result, Err(ConfigError::MissingServiceId)));
    }

    #[test]
    fn test_validation_errors() {
        let no_streams = loader(Some("s:x")).build(parse(""));
        assert!(matches!(no_streams, Err(ConfigError::ValidationError(_))));

        let bad_event = loader(Some("s:x")).build(parse(
            "[[streams]]\nplatform = \"pc\"\nevents = [\"NotAnEvent\"]\n",
        ));
        assert!(matches!(bad_event, Err(ConfigError::ValidationError(_))));

        let duplicate = loader(Some("s:x")).build(parse(
            "[[streams]]\nplatform = \"pc\"\n[[streams]]\nplatform = \"pc\"\n",
        ));
        assert!(matches!(duplicate, Err(ConfigError::ValidationError(_))));

        let bad_alert = loader(Some("s:x")).build(parse(
            "[[streams]]\nplatform = \"pc\"\n[alerts.durations]\nabc = 30\n",
        ));
        assert!(matches!(bad_alert, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_alert_durations_are_converted() {
        let config = loader(Some("s:x"))
            .build(parse(
                "[[streams]]\nplatform = \"pc\"\n[alerts.durations]\n\"147\" = 45\n",
            ))
            .unwrap();
        assert_eq!(config.alerts.duration_of(Some(147)), time::Duration::minutes(45));
        assert_eq!(config.alerts.duration_of(Some(1)), time::Duration::minutes(90));
    }
}
