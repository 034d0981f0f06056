//! Websocket client for the push event service.
//!
//! The client owns exactly one connection and never retries on its own:
//!
//! 1. [`connect`](StreamingClient::connect) performs the handshake.
//! 2. [`subscribe`](StreamingClient::subscribe) sends the declared filter and
//!    has to be repeated after every reconnect.
//! 3. [`run`](StreamingClient::run) reads frames until the connection drops,
//!    goes silent, or shutdown is signaled.
//!
//! Every text frame is parsed to JSON and pushed to a bounded queue with
//! `try_send`. A full queue drops the frame with a warning instead of
//! stalling the socket.

use super::ClientError;
use crate::objects::{Command, Platform, SubscriptionSettings};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Queue receiving raw decoded frames.
pub type FrameSender = mpsc::Sender<serde_json::Value>;

const PUSH_HOST: &str = "wss://push.planetside2.com/streaming";

/// Build the push endpoint for a platform.
pub fn push_endpoint(platform: Platform, service_id: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(PUSH_HOST)?;
    url.query_pairs_mut()
        .append_pair("environment", platform.environment())
        .append_pair("service-id", service_id);
    Ok(url)
}

/// Connection settings for one [`StreamingClient`].
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    pub endpoint: Url,
    /// The service heartbeats every few seconds, so silence this long means
    /// the connection is dead even if TCP has not noticed.
    pub inactivity_timeout: Duration,
}

impl StreamingConfig {
    pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            inactivity_timeout: Self::DEFAULT_INACTIVITY_TIMEOUT,
        }
    }
}

/// One push connection.
pub struct StreamingClient {
    config: StreamingConfig,
    frames: FrameSender,
    writer: Mutex<Option<SplitSink<WsStream, Message>>>,
    reader: Mutex<Option<SplitStream<WsStream>>>,
}

impl StreamingClient {
    pub fn new(config: StreamingConfig, frames: FrameSender) -> Self {
        Self {
            config,
            frames,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.config.endpoint
    }

    /// Open the websocket. Any previous connection is replaced.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let (stream, _response) = connect_async(self.config.endpoint.as_str()).await?;
        let (write, read) = stream.split();
        *self.writer.lock().await = Some(write);
        *self.reader.lock().await = Some(read);
        info!(host = ?self.config.endpoint.host_str(), "Connected to push service");
        Ok(())
    }

    /// Send the subscription filter on the current connection.
    pub async fn subscribe(&self, settings: &SubscriptionSettings) -> Result<(), ClientError> {
        let command = Command::subscribe(settings.clone()).to_json()?;
        self.send_text(command).await?;
        debug!(
            worlds = settings.worlds.len(),
            event_names = settings.event_names.len(),
            "Sent subscription"
        );
        Ok(())
    }

    /// Drop every subscription on the current connection.
    pub async fn clear_subscriptions(&self) -> Result<(), ClientError> {
        self.send_text(Command::clear_all().to_json()?).await
    }

    async fn send_text(&self, text: String) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Read frames until the connection ends.
    ///
    /// Returns `Ok(())` only when shutdown was signaled. A remote close, a
    /// read error, or an inactivity timeout are returned as errors so the
    /// caller can reconnect.
    pub async fn run(&self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<(), ClientError> {
        let Some(mut read) = self.reader.lock().await.take() else {
            return Err(ClientError::NotConnected);
        };

        if *shutdown_rx.borrow() {
            self.close().await;
            return Ok(());
        }

        let timeout = self.config.inactivity_timeout;
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Streaming client received shutdown signal");
                        self.close().await;
                        return Ok(());
                    }
                }

                next = tokio::time::timeout(timeout, read.next()) => {
                    match next {
                        Ok(Some(Ok(Message::Text(text)))) => self.forward(&text),
                        Ok(Some(Ok(Message::Close(frame)))) => {
                            info!(?frame, "Push service closed the connection");
                            self.close().await;
                            return Err(ClientError::Closed);
                        }
                        Ok(Some(Ok(_))) => {}
                        Ok(Some(Err(e))) => {
                            self.close().await;
                            return Err(e.into());
                        }
                        Ok(None) => {
                            self.close().await;
                            return Err(ClientError::Closed);
                        }
                        Err(_) => {
                            warn!(timeout = ?timeout, "Push connection went silent");
                            self.close().await;
                            return Err(ClientError::Inactive(timeout));
                        }
                    }
                }
            }
        }
    }

    fn forward(&self, text: &str) {
        let frame = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping frame that is not JSON");
                return;
            }
        };
        match self.frames.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Frame queue is full, dropping frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Frame queue closed, dropping frame");
            }
        }
    }

    /// Release the connection. Safe to call repeatedly.
    pub async fn close(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Error while closing websocket");
            }
        }
        self.reader.lock().await.take();
    }
}
