//! # anilibria
//!
//! Async client for the AniLibria anime catalog.
//!
//! - **[`AniLibriaClient`]**: one object owning the REST client, the handler
//!   registry and the realtime gateway
//! - **Events**: typed records re-exported from `anilibria-gateway`, registered
//!   with [`AniLibriaClient::on`]
//! - **Logging**: [`logging::init_subscriber`] for applications that want
//!   the client's `tracing` output
//!
//! ## Crate Position
//!
//! Top-level facade. Depends on: anilibria-core, anilibria-settings,
//! anilibria-http, anilibria-gateway.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;

pub use anilibria_core::logging;
pub use anilibria_core::{
    Episode, FetchError, Hls, Player, Playlist, Title, TitleFetcher, Torrents,
};
pub use anilibria_gateway::{
    Connect, ConnectionState, EncodeEnd, EncodeFinish, EncodeProgress, EncodeStart, EventKind,
    Filter, FilterValue, GatewayEvent, Handler, PlaylistUpdate, Scalar, SubscriptionAck,
    TitleEpisode, TitleUpdate, TorrentUpdate, TypedEvent, handler_fn, names,
};
pub use anilibria_http::TitleQuery;
pub use anilibria_settings::ClientSettings;
pub use client::AniLibriaClient;
pub use errors::{ClientError, Result};
