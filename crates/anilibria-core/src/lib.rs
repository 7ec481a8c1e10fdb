//! # anilibria-core
//!
//! Shared vocabulary for the AniLibria client crates.
//!
//! - **Records**: [`Title`], [`Episode`], [`Hls`], [`Player`] and friends, as
//!   returned by the REST API and embedded in gateway payloads
//! - **Collaborators**: the [`TitleFetcher`] trait the gateway uses to enrich
//!   partial updates into full title records
//! - **Errors**: [`FetchError`] for collaborator failures
//! - **Logging**: `tracing` subscriber setup for applications

#![deny(unsafe_code)]

pub mod errors;
pub mod fetch;
pub mod logging;
pub mod models;

pub use errors::FetchError;
pub use fetch::TitleFetcher;
pub use models::*;
