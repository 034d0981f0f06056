//! Protocol decoder.
//!
//! Turns raw JSON frames into [`ServerMessage`] values and publishes them.
//! A frame that cannot be classified or decoded is dropped with a warning;
//! the connection and every later frame are unaffected.

use crate::events::{EventBus, FrameReceiver};
use crate::publisher::Publisher;
use auraxis_sdk::objects::messages::{
    ConnectionStateChanged, Heartbeat, ServiceStateChanged, SubscriptionEcho,
};
use auraxis_sdk::objects::{EventKind, GameEvent, MessageKind, ServerMessage};
use kanau::processor::Processor;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const HELP_KEY: &str = "send this for help";

/// Errors produced while decoding one frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame has neither a `type` nor one of the untyped shapes
    #[error("message has no type")]
    MissingType,

    /// `type` is not one the service is known to send
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// A service message without a usable `payload` object
    #[error("service message has no payload")]
    MissingPayload,

    /// `payload.event_name` names an event this crate does not model
    #[error("unknown event name: {0}")]
    UnknownEvent(String),

    /// The structure did not match the expected schema
    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

fn malformed(kind: MessageKind) -> impl FnOnce(serde_json::Error) -> DecodeError {
    move |source| DecodeError::Malformed { kind, source }
}

/// Decode one raw frame into a freshly allocated [`ServerMessage`].
pub fn decode_message(raw: Value) -> Result<ServerMessage, DecodeError> {
    let Value::Object(mut object) = raw else {
        return Err(DecodeError::MissingType);
    };

    let ty = match object.get("type") {
        Some(Value::String(ty)) => ty.clone(),
        Some(_) => return Err(DecodeError::MissingType),
        None => {
            if let Some(subscription) = object.remove("subscription") {
                let echo: SubscriptionEcho = serde_json::from_value(subscription)
                    .map_err(malformed(MessageKind::Subscription))?;
                return Ok(ServerMessage::Subscription(echo));
            }
            if object.contains_key(HELP_KEY) {
                return Ok(ServerMessage::Help(Value::Object(object)));
            }
            return Err(DecodeError::MissingType);
        }
    };

    let kind = MessageKind::from_type(&ty).ok_or(DecodeError::UnknownType(ty))?;
    let raw = Value::Object(object);
    Ok(match kind {
        MessageKind::ConnectionStateChanged => ServerMessage::ConnectionStateChanged(
            serde_json::from_value::<ConnectionStateChanged>(raw).map_err(malformed(kind))?,
        ),
        MessageKind::Heartbeat => ServerMessage::Heartbeat(
            serde_json::from_value::<Heartbeat>(raw).map_err(malformed(kind))?,
        ),
        MessageKind::ServiceStateChanged => ServerMessage::ServiceStateChanged(
            serde_json::from_value::<ServiceStateChanged>(raw).map_err(malformed(kind))?,
        ),
        MessageKind::ServiceMessage => ServerMessage::ServiceMessage(decode_event(raw)?),
        MessageKind::Subscription | MessageKind::Help => {
            return Err(DecodeError::UnknownType(kind.to_string()));
        }
    })
}

fn decode_event(raw: Value) -> Result<GameEvent, DecodeError> {
    let Value::Object(mut envelope) = raw else {
        return Err(DecodeError::MissingPayload);
    };
    let Some(payload @ Value::Object(_)) = envelope.remove("payload") else {
        return Err(DecodeError::MissingPayload);
    };
    let name = payload
        .get("event_name")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingPayload)?;
    let kind: EventKind = name
        .parse()
        .map_err(|_| DecodeError::UnknownEvent(name.to_owned()))?;
    GameEvent::from_payload(kind, payload).map_err(malformed(MessageKind::ServiceMessage))
}

/// Decodes frames from one push connection and publishes the result.
///
/// Every message goes to `messages`; game events additionally go to
/// `raw_events`, keyed by event kind.
pub struct MessageDecoder {
    messages: Publisher<ServerMessage>,
    raw_events: Publisher<GameEvent>,
}

impl MessageDecoder {
    pub fn new(bus: &EventBus) -> Self {
        Self {
            messages: bus.messages.clone(),
            raw_events: bus.raw_events.clone(),
        }
    }

    /// Decode and publish one frame.
    pub fn publish(&self, raw: Value) -> Result<MessageKind, DecodeError> {
        let message = decode_message(raw)?;
        let kind = message.kind();
        self.messages.publish(&message);
        if let ServerMessage::ServiceMessage(event) = &message {
            self.raw_events.publish(event);
        }
        Ok(kind)
    }

    /// Drain `frames_rx` until shutdown or until every sender is gone.
    ///
    /// Frames already queued when shutdown fires are still decoded so nothing
    /// accepted off the socket is lost.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut frames_rx: FrameReceiver) {
        info!("MessageDecoder started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("MessageDecoder received shutdown signal");
                        break;
                    }
                }

                Some(frame) = frames_rx.recv() => {
                    let _ = self.process(frame).await;
                }

                else => {
                    info!("Frame channel closed");
                    break;
                }
            }
        }

        frames_rx.close();
        let mut drained = 0usize;
        while let Ok(frame) = frames_rx.try_recv() {
            let _ = self.process(frame).await;
            drained += 1;
        }

        info!(drained, "MessageDecoder shutdown complete");
    }
}

impl Processor<Value> for MessageDecoder {
    type Output = ();
    type Error = std::convert::Infallible;

    async fn process(&self, frame: Value) -> Result<(), std::convert::Infallible> {
        match self.publish(frame) {
            Ok(kind) => debug!(%kind, "Decoded message"),
            Err(e) => warn!(error = %e, "Dropping undecodable message"),
        }
        Ok(())
    }
}
