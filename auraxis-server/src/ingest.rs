//! Keeps one push connection alive.
//!
//! The supervisor loops connect → subscribe → read. When the connection
//! drops it waits out an exponential backoff and starts over, re-sending the
//! current subscription filter. A reloaded filter is applied to the live
//! connection by clearing and re-subscribing.
//!
//! Handshake and command writes are bounded by [`STEP_TIMEOUT`] and
//! abandoned as soon as shutdown is signalled.

use auraxis_core::config::ConfigStore;
use auraxis_core::utils::{ExponentialBackoff, shutdown_requested};
use auraxis_sdk::client::{ClientError, StreamingClient};
use auraxis_sdk::objects::{Platform, SubscriptionSettings};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Upper bound for connecting, subscribing and closing.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Await `step` for at most `limit`. `None` means shutdown came first.
async fn bounded<T>(
    shutdown_rx: &mut watch::Receiver<bool>,
    limit: Duration,
    step: impl Future<Output = Result<T, ClientError>>,
) -> Option<Result<T, ClientError>> {
    tokio::select! {
        biased;

        _ = shutdown_requested(shutdown_rx) => None,
        result = tokio::time::timeout(limit, step) => {
            Some(result.unwrap_or_else(|_| Err(ClientError::Timeout(limit))))
        }
    }
}

pub struct StreamSupervisor {
    platform: Platform,
    client: Arc<StreamingClient>,
    subscription: ConfigStore<SubscriptionSettings>,
    backoff: ExponentialBackoff,
    step_timeout: Duration,
}

impl StreamSupervisor {
    pub fn new(
        platform: Platform,
        client: Arc<StreamingClient>,
        subscription: ConfigStore<SubscriptionSettings>,
    ) -> Self {
        Self {
            platform,
            client,
            subscription,
            backoff: ExponentialBackoff::default(),
            step_timeout: STEP_TIMEOUT,
        }
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(platform = %self.platform, endpoint = %self.client.endpoint(), "StreamSupervisor started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.session(&mut shutdown_rx).await {
                Ok(()) => break,
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    warn!(
                        platform = %self.platform,
                        error = %e,
                        attempt = self.backoff.attempt(),
                        retry_in = ?delay,
                        "Push connection lost"
                    );
                    tokio::select! {
                        biased;

                        _ = shutdown_requested(&mut shutdown_rx) => break,

                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        if tokio::time::timeout(self.step_timeout, self.client.close())
            .await
            .is_err()
        {
            warn!(platform = %self.platform, "Timed out closing push connection");
        }
        info!(platform = %self.platform, "StreamSupervisor shutdown complete");
    }

    /// One connection from handshake to drop. `Ok` means shutdown.
    async fn session(&mut self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<(), ClientError> {
        let client = Arc::clone(&self.client);
        let limit = self.step_timeout;
        let Some(connected) = bounded(shutdown_rx, limit, client.connect()).await else {
            return Ok(());
        };
        connected?;

        // Watch before reading so a reload racing the subscribe is not missed.
        let mut watcher = self.subscription.subscribe();
        let settings = self.subscription.snapshot().await;
        let Some(subscribed) = bounded(shutdown_rx, limit, client.subscribe(&settings)).await else {
            return Ok(());
        };
        subscribed?;
        self.backoff.reset();
        info!(
            platform = %self.platform,
            worlds = settings.worlds.len(),
            events = settings.event_names.len(),
            "Subscribed to push events"
        );

        let read = client.run(shutdown_rx);
        tokio::pin!(read);
        let mut watching = true;

        loop {
            tokio::select! {
                result = &mut read => return result,

                changed = watcher.changed(), if watching => {
                    if changed.is_err() {
                        watching = false;
                        continue;
                    }
                    let settings = self.subscription.snapshot().await;
                    let resubscribe = async {
                        client.clear_subscriptions().await?;
                        client.subscribe(&settings).await
                    };
                    tokio::time::timeout(limit, resubscribe)
                        .await
                        .unwrap_or_else(|_| Err(ClientError::Timeout(limit)))?;
                    info!(platform = %self.platform, "Applied reloaded subscription");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auraxis_sdk::client::StreamingConfig;
    use auraxis_sdk::objects::{EventKind, WorldId};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::Message;
    use url::Url;

    fn settings(worlds: &[WorldId]) -> SubscriptionSettings {
        SubscriptionSettings::for_worlds(worlds, &[EventKind::PlayerLogin])
    }

    async fn next_text(
        ws: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    ) -> serde_json::Value {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_reconnect_resends_identical_subscription() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();

        let (frames_tx, mut frames_rx) = mpsc::channel(16);
        let client = Arc::new(StreamingClient::new(StreamingConfig::new(url), frames_tx));
        let store = ConfigStore::new(settings(&[WorldId::EMERALD]));
        let supervisor = StreamSupervisor::new(Platform::Pc, client, store.clone()).with_backoff(
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(20))
                .with_jitter(0.0),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor.run(shutdown_rx));

        // First connection: read the subscription, then drop the socket.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let first = next_text(&mut ws).await;
        assert_eq!(first["action"], "subscribe");
        drop(ws);

        // Second connection gets the same filter.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let second = next_text(&mut ws).await;
        assert_eq!(first, second);

        ws.send(Message::Text(r#"{"type":"heartbeat"}"#.into()))
            .await
            .unwrap();
        let frame = frames_rx.recv().await.unwrap();
        assert_eq!(frame["type"], "heartbeat");

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    fn supervisor_for(url: Url) -> StreamSupervisor {
        let (frames_tx, _frames_rx) = mpsc::channel(16);
        let client = Arc::new(StreamingClient::new(StreamingConfig::new(url), frames_tx));
        StreamSupervisor::new(Platform::Pc, client, ConfigStore::new(settings(&[WorldId::EMERALD])))
            .with_backoff(
                ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(20))
                    .with_jitter(0.0),
            )
    }

    #[tokio::test]
    async fn test_shutdown_during_stalled_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor_for(url).run(shutdown_rx));

        // Accept the TCP connection but never answer the upgrade request.
        let (_stream, _) = listener.accept().await.unwrap();
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("supervisor kept waiting on the handshake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stalled_handshake_times_out_and_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = supervisor_for(url).with_step_timeout(Duration::from_millis(100));
        let task = tokio::spawn(supervisor.run(shutdown_rx));

        let (_first, _) = listener.accept().await.unwrap();
        let (_second, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("no reconnect after the handshake timed out")
            .unwrap();

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_retrying() {
        // Bind and release a port so every connect is refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor_for(url).run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        drop(shutdown_tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("supervisor kept reconnecting without a shutdown sender")
            .unwrap();
    }

    #[tokio::test]
    async fn test_reload_resubscribes_live_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}", listener.local_addr().unwrap())).unwrap();

        let (frames_tx, _frames_rx) = mpsc::channel(16);
        let client = Arc::new(StreamingClient::new(StreamingConfig::new(url), frames_tx));
        let store = ConfigStore::new(settings(&[WorldId::EMERALD]));
        let supervisor = StreamSupervisor::new(Platform::Pc, client, store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervisor.run(shutdown_rx));

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let first = next_text(&mut ws).await;
        assert_eq!(first["worlds"], serde_json::json!(["17"]));

        store.update(settings(&[WorldId::MILLER])).await;
        let clear = next_text(&mut ws).await;
        assert_eq!(clear["action"], "clearSubscribe");
        let resubscribe = next_text(&mut ws).await;
        assert_eq!(resubscribe["action"], "subscribe");
        assert_eq!(resubscribe["worlds"], serde_json::json!(["10"]));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
