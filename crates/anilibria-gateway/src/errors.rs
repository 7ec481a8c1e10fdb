//! Gateway error types.

use anilibria_core::FetchError;
use thiserror::Error;

/// Connection and supervisor failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Opening the socket failed.
    #[error("failed to connect to {url}: {reason}")]
    Connect {
        /// Endpoint that was dialed.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The live socket reported an error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The socket is already closed.
    #[error("connection closed")]
    Closed,

    /// `send` was called while no connection is established.
    #[error("no active connection")]
    NotConnected,

    /// The supervisor is shutting down or already stopped.
    #[error("gateway is shutting down")]
    ShuttingDown,

    /// `start` was called while the supervisor is already running.
    #[error("gateway is already running")]
    AlreadyRunning,

    /// Consecutive connection failures exceeded the configured limit.
    #[error("gave up after {attempts} consecutive failures: {last_error}")]
    RetriesExhausted {
        /// Failures counted.
        attempts: u32,
        /// Most recent failure.
        last_error: String,
    },

    /// An outbound payload could not be serialized.
    #[error("failed to serialize outbound frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A payload did not fit the shape declared for its tag.
#[derive(Debug, Error)]
#[error("failed to decode {tag}: {source}")]
pub struct DecodeError {
    /// Tag of the offending message.
    pub tag: String,
    /// Decoder failure.
    #[source]
    pub source: serde_json::Error,
}

/// A filter pattern could not be built.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The top-level pattern is not a JSON object.
    #[error("filter must be an object, got {0}")]
    NotAnObject(String),

    /// A value kind the matcher cannot compare.
    #[error("unsupported filter value at `{path}`: {reason}")]
    Unsupported {
        /// Dotted key path of the value.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// The episode deriver could not build a `TitleEpisode`.
#[derive(Debug, Error)]
pub enum DeriveError {
    /// Title enrichment failed.
    #[error("title {id} fetch failed: {source}")]
    Fetch {
        /// Title id that was requested.
        id: i64,
        /// Collaborator failure.
        #[source]
        source: FetchError,
    },

    /// The update carries no title id to fetch.
    #[error("playlist update has no title id")]
    MissingId,
}

/// Convenience alias for gateway results.
pub type Result<T> = std::result::Result<T, GatewayError>;
