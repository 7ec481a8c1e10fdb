//! Typed decoding of tagged payloads.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::DecodeError;
use crate::events::{
    EncodeEnd, EncodeFinish, EncodeProgress, EncodeStart, EventKind, GatewayEvent,
    PlaylistUpdate, TitleUpdate, TorrentUpdate,
};

/// Turns the payload of a known tag into its typed event.
pub trait Decoder: Send + Sync {
    /// Decode `payload` (the object under the tag key) as `kind`.
    fn decode(&self, kind: EventKind, payload: &Value) -> Result<GatewayEvent, DecodeError>;
}

/// [`Decoder`] backed by the records' `serde` implementations.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerdeDecoder;

impl Decoder for SerdeDecoder {
    fn decode(&self, kind: EventKind, payload: &Value) -> Result<GatewayEvent, DecodeError> {
        Ok(match kind {
            EventKind::TitleUpdate => GatewayEvent::TitleUpdate(parse::<TitleUpdate>(kind.tag(), payload)?),
            EventKind::PlaylistUpdate => {
                GatewayEvent::PlaylistUpdate(parse::<PlaylistUpdate>(kind.tag(), payload)?)
            }
            EventKind::EncodeStart => GatewayEvent::EncodeStart(parse::<EncodeStart>(kind.tag(), payload)?),
            EventKind::EncodeProgress => {
                GatewayEvent::EncodeProgress(parse::<EncodeProgress>(kind.tag(), payload)?)
            }
            EventKind::EncodeEnd => GatewayEvent::EncodeEnd(parse::<EncodeEnd>(kind.tag(), payload)?),
            EventKind::EncodeFinish => {
                GatewayEvent::EncodeFinish(parse::<EncodeFinish>(kind.tag(), payload)?)
            }
            EventKind::TorrentUpdate => {
                GatewayEvent::TorrentUpdate(parse::<TorrentUpdate>(kind.tag(), payload)?)
            }
        })
    }
}

/// Decode `payload` into `T`, labelling failures with `tag`.
pub(crate) fn parse<T: DeserializeOwned>(tag: &str, payload: &Value) -> Result<T, DecodeError> {
    T::deserialize(payload).map_err(|source| DecodeError {
        tag: tag.to_string(),
        source,
    })
}
