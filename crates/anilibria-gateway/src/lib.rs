//! # anilibria-gateway
//!
//! Realtime gateway client for the AniLibria API.
//!
//! - **Supervisor**: dials, reconnects with backoff, replays subscriptions,
//!   publishes [`ConnectionState`]
//! - **Transport**: [`Transport`]/[`Connection`] seam, `tokio-tungstenite` by default
//! - **Classifier**: frame → [`GatewayEvent`] via the [`EventKind`] table and a [`Decoder`]
//! - **Registry**: named handlers with optional [`Filter`]s, fire-and-forget dispatch
//! - **Deriver**: the `on_title_episode` heuristic over playlist updates
//!
//! ## Crate Position
//!
//! Depends on: anilibria-core, anilibria-settings.
//! Depended on by: anilibria.

#![deny(unsafe_code)]

pub mod backoff;
pub mod classifier;
pub mod decode;
pub mod deriver;
pub mod errors;
pub mod events;
pub mod filter;
pub mod pipeline;
pub mod registry;
mod state;
pub mod supervisor;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use classifier::{Classified, Classifier};
pub use decode::{Decoder, SerdeDecoder};
pub use deriver::{EpisodeDeriver, Verdict};
pub use errors::{DecodeError, DeriveError, FilterError, GatewayError, Result};
pub use events::{
    Connect, EncodeEnd, EncodeFinish, EncodeProgress, EncodeStart, EventKind, GatewayEvent,
    PlaylistUpdate, Startup, SubscriptionAck, TitleEpisode, TitleUpdate, TorrentUpdate,
    TypedEvent, names,
};
pub use filter::{Filter, FilterValue, Scalar};
pub use pipeline::Pipeline;
pub use registry::{EventRegistry, Handler, TypedHandler, handler_fn};
pub use state::ConnectionState;
pub use supervisor::GatewaySupervisor;
pub use transport::{Connection, Transport, TungsteniteConnection, TungsteniteTransport};
