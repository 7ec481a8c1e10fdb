//! # anilibria-settings
//!
//! Layered configuration for the AniLibria client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ClientSettings::default()`]
//! 2. **User file**: `~/.anilibria/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ANILIBRIA_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use anilibria_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("gateway: {}", settings.gateway.url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
