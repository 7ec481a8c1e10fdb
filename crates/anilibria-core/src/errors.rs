//! Collaborator error types.

use thiserror::Error;

/// Failure of a [`TitleFetcher`](crate::fetch::TitleFetcher) call.
///
/// Deliberately transport-agnostic: the REST crate maps its own error type
/// into this one so the gateway never depends on `reqwest`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request failed: {message}")]
    Transport {
        /// Underlying error text.
        message: String,
    },

    /// The API answered with an error body.
    #[error("API error {code}: {message}")]
    Api {
        /// Error code reported by the API.
        code: i64,
        /// Error message reported by the API.
        message: String,
    },

    /// The response body did not decode into the expected record.
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decoder error text.
        message: String,
    },
}
