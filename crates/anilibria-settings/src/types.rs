//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a
//! settings file only needs the keys it wants to change.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the client.
///
/// ```json
/// {
///   "gateway": { "reconnect": { "maxRetries": 0 } },
///   "http": { "proxy": "http://127.0.0.1:8080" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Realtime gateway connection.
    pub gateway: GatewaySettings,
    /// REST API access.
    pub http: HttpSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl ClientSettings {
    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.gateway.url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SettingsError::InvalidValue(format!(
                "gateway.url must use ws:// or wss://, got {url}"
            )));
        }
        let base = self.http.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(SettingsError::InvalidValue(format!(
                "http.baseUrl must use http:// or https://, got {base}"
            )));
        }
        let reconnect = &self.gateway.reconnect;
        if !(0.0..=1.0).contains(&reconnect.jitter_factor) {
            return Err(SettingsError::InvalidValue(format!(
                "gateway.reconnect.jitterFactor must be within 0..=1, got {}",
                reconnect.jitter_factor
            )));
        }
        if reconnect.base_delay_ms > reconnect.max_delay_ms {
            return Err(SettingsError::InvalidValue(format!(
                "gateway.reconnect.baseDelayMs ({}) exceeds maxDelayMs ({})",
                reconnect.base_delay_ms, reconnect.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Realtime gateway settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// WebSocket endpoint.
    pub url: String,
    /// Timeout for a single connection attempt in milliseconds.
    pub connect_timeout_ms: u64,
    /// Reconnect policy.
    pub reconnect: ReconnectSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: "wss://api.anilibria.tv/v3/ws/".to_string(),
            connect_timeout_ms: 10_000,
            reconnect: ReconnectSettings::default(),
        }
    }
}

/// Reconnect backoff settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Consecutive failures tolerated before giving up. `0` retries forever.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on a single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor, 0.0–1.0.
    pub jitter_factor: f64,
    /// Uptime in milliseconds after which a dropped session no longer
    /// counts as a failure.
    pub stable_after_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter_factor: 0.2,
            stable_after_ms: 5000,
        }
    }
}

/// REST API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Optional proxy URL for every REST request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anilibria.tv/v3".to_string(),
            timeout_ms: 30_000,
            proxy: None,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
