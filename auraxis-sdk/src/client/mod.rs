//! Network clients for the push event service and the Census REST API.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest` and `tokio-tungstenite`.

mod census;
mod streaming;

pub use census::CensusClient;
pub use streaming::{FrameSender, StreamingClient, StreamingConfig, push_endpoint};

use reqwest::StatusCode;
use std::time::Duration;

/// Errors produced by the SDK clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Websocket handshake or transport failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP transport failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Census API returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// The Census API answered 2xx with an error document.
    #[error("census error: {0}")]
    Census(String),

    /// Payload could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The endpoint URL could not be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// An operation needing a live connection was called before `connect`.
    #[error("not connected")]
    NotConnected,

    /// The remote side closed the stream.
    #[error("connection closed by remote")]
    Closed,

    /// No frame arrived within the inactivity timeout.
    #[error("no frame received for {0:?}")]
    Inactive(Duration),

    /// A handshake or command did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}
