//! Inbound message classification.
//!
//! Decides what an inbound JSON object is from its `type` tag:
//!
//! | shape | result |
//! |---|---|
//! | no tag, `connection: "success"` | [`GatewayEvent::Connect`] |
//! | no tag, has `subscribe` | [`GatewayEvent::Subscription`] |
//! | no tag, anything else | [`Classified::Unclassified`] |
//! | known tag | typed event decoded from `payload[tag]` |
//! | unknown tag | [`GatewayEvent::Unknown`] with the whole payload |

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::decode::{Decoder, SerdeDecoder, parse};
use crate::errors::DecodeError;
use crate::events::{Connect, EventKind, GatewayEvent, SubscriptionAck};

/// Outcome of classifying one inbound object.
#[derive(Clone, Debug, PartialEq)]
pub enum Classified {
    /// A dispatchable event.
    Event {
        /// Decoded event.
        event: GatewayEvent,
        /// Raw data handler filters are matched against.
        subject: Value,
    },
    /// Untagged message that is neither a handshake nor an acknowledgment.
    Unclassified,
}

/// Routes inbound objects to event kinds and decodes them.
#[derive(Clone)]
pub struct Classifier {
    decoder: Arc<dyn Decoder>,
}

impl Classifier {
    /// Classifier with a custom decoder.
    pub fn new(decoder: Arc<dyn Decoder>) -> Self {
        Self { decoder }
    }

    /// Classify one inbound object.
    pub fn classify(&self, payload: &Value) -> Result<Classified, DecodeError> {
        let Some(tag) = payload.get("type").and_then(Value::as_str) else {
            return classify_untagged(payload);
        };

        let Some(kind) = EventKind::from_tag(tag) else {
            debug!(tag, "undocumented event type");
            return Ok(Classified::Event {
                event: GatewayEvent::Unknown {
                    tag: tag.to_string(),
                    payload: payload.clone(),
                },
                subject: payload.clone(),
            });
        };

        let subject = payload.get(tag).cloned().unwrap_or(Value::Null);
        let event = self.decoder.decode(kind, &subject)?;
        Ok(Classified::Event { event, subject })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(SerdeDecoder))
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier").finish_non_exhaustive()
    }
}

fn classify_untagged(payload: &Value) -> Result<Classified, DecodeError> {
    if payload.get("connection").and_then(Value::as_str) == Some("success") {
        let connect: Connect = parse("connection", payload)?;
        return Ok(Classified::Event {
            event: GatewayEvent::Connect(connect),
            subject: payload.clone(),
        });
    }
    if payload.get("subscribe").is_some() {
        let ack: SubscriptionAck = parse("subscribe", payload)?;
        return Ok(Classified::Event {
            event: GatewayEvent::Subscription(ack),
            subject: payload.clone(),
        });
    }
    Ok(Classified::Unclassified)
}
