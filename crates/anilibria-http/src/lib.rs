//! # anilibria-http
//!
//! Minimal REST access to the AniLibria catalog.
//!
//! Only what the realtime gateway needs is covered: [`HttpClient::get_title`]
//! and its [`TitleFetcher`](anilibria_core::TitleFetcher) implementation,
//! which the episode deriver uses to turn a partial playlist update into a
//! full title record.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod query;

pub use client::HttpClient;
pub use errors::{HttpError, Result};
pub use query::TitleQuery;
