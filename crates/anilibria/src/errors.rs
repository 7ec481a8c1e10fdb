//! Client error types.

use anilibria_gateway::{FilterError, GatewayError};
use anilibria_http::HttpError;
use anilibria_settings::SettingsError;
use thiserror::Error;

/// Errors surfaced by [`AniLibriaClient`](crate::AniLibriaClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Settings failed to load or validate.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// REST request failed.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Gateway failed or gave up reconnecting.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// A handler filter could not be built.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
