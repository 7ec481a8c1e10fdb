//! REST error types.

use anilibria_core::FetchError;
use thiserror::Error;

/// Errors from REST calls.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned an `{"error": {...}}` body.
    #[error("API error {code}: {message}")]
    Api {
        /// API error code.
        code: i64,
        /// API error message.
        message: String,
    },

    /// Non-success status without a recognizable error body.
    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The body was not the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// None of the required lookup arguments were provided.
    #[error("at least one of {} is required", .0.join(", "))]
    MissingArguments(&'static [&'static str]),
}

/// Result type for REST operations.
pub type Result<T> = std::result::Result<T, HttpError>;

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api { code, message } => FetchError::Api { code, message },
            HttpError::Decode(e) => FetchError::Decode {
                message: e.to_string(),
            },
            other => FetchError::Transport {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn missing_arguments_display() {
        let err = HttpError::MissingArguments(&["id", "code"]);
        assert_eq!(err.to_string(), "at least one of id, code is required");
    }

    #[test]
    fn api_error_maps_to_fetch_api() {
        let err = HttpError::Api {
            code: 404,
            message: "Release not found".into(),
        };
        assert_matches!(FetchError::from(err), FetchError::Api { code: 404, .. });
    }

    #[test]
    fn decode_error_maps_to_fetch_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_matches!(
            FetchError::from(HttpError::Decode(json_err)),
            FetchError::Decode { .. }
        );
    }

    #[test]
    fn status_error_maps_to_fetch_transport() {
        let err = HttpError::Status {
            status: 502,
            body: "Bad Gateway".into(),
        };
        assert_matches!(FetchError::from(err), FetchError::Transport { message } if message.contains("502"));
    }
}
