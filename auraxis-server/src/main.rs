//! Auraxis Server
//!
//! Follows the PlanetSide 2 push event stream and keeps live presence,
//! population, facility ownership and alert state in memory.

mod config;
mod ingest;
mod monitor;
mod resolver;
mod shutdown;
mod state;

use auraxis_core::config::ConfigStore;
use auraxis_core::decoder::MessageDecoder;
use auraxis_core::events::{DEFAULT_CHANNEL_BUFFER, EventBus, frame_channel};
use auraxis_core::processors::{
    CharacterLoader, CharacterResolver, FacilityTracker, OutfitMembersLoader,
    OutfitMembersSynchronizer, PresenceTracker, ReloginSuppressor,
};
use auraxis_sdk::client::{StreamingClient, StreamingConfig, push_endpoint};
use auraxis_sdk::objects::EventKind;
use clap::Parser;
use config::ConfigLoader;
use ingest::StreamSupervisor;
use resolver::CensusResolver;
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use state::AppState;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Auraxis - live PlanetSide 2 event tracker
#[derive(Parser, Debug)]
#[command(name = "auraxis-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./auraxis-config.toml")]
    config: PathBuf,

    /// Census service id (e.g. s:example), overrides the config file
    #[arg(short, long, env = "CENSUS_SERVICE_ID")]
    service_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting auraxis-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.service_id));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let bus = EventBus::new();
    let census = Arc::new(CensusResolver::new(
        &loaded_config.service_id,
        loaded_config.census_base_url.as_deref(),
        &loaded_config.platforms(),
    ));

    // Shutdown is staged: connections first, then the suppressor so held
    // logouts reach the trackers, then everything downstream.
    let (stream_shutdown_tx, stream_shutdown_rx) = watch::channel(false);
    let (suppressor_shutdown_tx, suppressor_shutdown_rx) = watch::channel(false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Re-login suppression between raw_events and events
    let suppressor = Arc::new(ReloginSuppressor::new(
        bus.events.clone(),
        loaded_config.suppressor.clone(),
    ));
    let suppressor_handle = suppressor.attach(&bus.raw_events);
    let suppressor_task = tokio::spawn(Arc::clone(&suppressor).run(suppressor_shutdown_rx));

    // Identity resolution
    let (character_loader, loader_handle) = CharacterLoader::new(
        Arc::clone(&census) as Arc<dyn CharacterResolver>,
        loaded_config.loader.clone(),
    );

    // Trackers
    let presence = Arc::new(PresenceTracker::new(
        loader_handle,
        loaded_config.presence.clone(),
    ));
    let facilities = Arc::new(FacilityTracker::new(
        loaded_config.topology.clone(),
        bus.derived.clone(),
        loaded_config.alerts.clone(),
    ));
    let presence_events = bus.events.subscribe(&EventKind::ALL, DEFAULT_CHANNEL_BUFFER);
    let facility_events = bus.events.subscribe(
        &[EventKind::FacilityControl, EventKind::MetagameEvent],
        DEFAULT_CHANNEL_BUFFER,
    );
    let synchronizer = OutfitMembersSynchronizer::new(
        Arc::clone(&census) as Arc<dyn OutfitMembersLoader>,
        bus.derived.clone(),
        loaded_config.outfit_sync.clone(),
    );

    let service_state_handle = monitor::watch_service_state(&bus.messages);
    let tracker_events = monitor::subscribe_tracker_events(&bus.derived);

    let mut processors = JoinSet::new();
    processors.spawn(character_loader.run(shutdown_rx.clone()));
    processors.spawn(Arc::clone(&presence).run(shutdown_rx.clone(), presence_events));
    processors.spawn(Arc::clone(&facilities).run(shutdown_rx.clone(), facility_events));
    processors.spawn(synchronizer.run(shutdown_rx.clone()));
    processors.spawn(monitor::run_tracker_log(tracker_events, shutdown_rx.clone()));

    // One connection per platform
    let mut subscriptions = HashMap::new();
    let mut streams = JoinSet::new();
    for stream in &loaded_config.streams {
        let endpoint = push_endpoint(stream.platform, &loaded_config.service_id)?;
        let (frames_tx, frames_rx) = frame_channel();
        let client = Arc::new(StreamingClient::new(
            StreamingConfig {
                endpoint,
                inactivity_timeout: stream.inactivity_timeout,
            },
            frames_tx,
        ));
        let store = ConfigStore::new(stream.subscription.clone());
        subscriptions.insert(stream.platform, store.clone());

        let supervisor = StreamSupervisor::new(stream.platform, client, store);
        streams.spawn(supervisor.run(stream_shutdown_rx.clone()));
        streams.spawn(MessageDecoder::new(&bus).run(stream_shutdown_rx.clone(), frames_rx));
    }

    let state = AppState {
        presence,
        facilities,
        subscriptions: Arc::new(subscriptions),
        tracking: ConfigStore::new(loaded_config.tracking.clone()),
    };
    processors.spawn(
        state
            .clone()
            .run_reporter(loaded_config.report_interval, shutdown_rx.clone()),
    );

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(state, config_loader)?;

    tracing::info!(streams = loaded_config.streams.len(), "Pipeline running");
    shutdown_signal().await?;

    // Stop the connections and drain the frame queues
    let _ = stream_shutdown_tx.send(true);
    while let Some(result) = streams.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Ingestion task failed");
        }
    }

    // Release held logouts
    suppressor_handle.unsubscribe();
    let _ = suppressor_shutdown_tx.send(true);
    if let Err(e) = suppressor_task.await {
        tracing::error!(error = %e, "ReloginSuppressor task failed");
    }

    let _ = shutdown_tx.send(true);
    while let Some(result) = processors.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Processor task failed");
        }
    }

    service_state_handle.unsubscribe();
    reload_notify.notify_one();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tokio_tungstenite=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
