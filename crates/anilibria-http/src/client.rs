//! `reqwest`-backed REST client.

use std::time::Duration;

use anilibria_core::{FetchError, Title, TitleFetcher};
use anilibria_settings::HttpSettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::{HttpError, Result};
use crate::query::TitleQuery;

/// Longest response body excerpt kept in [`HttpError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// REST client for the catalog API.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Client for `base_url` with default timeouts and no proxy.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::from_settings(&HttpSettings {
            base_url: base_url.into(),
            ..HttpSettings::default()
        })
    }

    /// Client configured from settings.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(concat!("anilibria-rs/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy) = &settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a single title.
    pub async fn get_title(&self, query: &TitleQuery) -> Result<Title> {
        if !query.is_addressable() {
            return Err(HttpError::MissingArguments(&["id", "code", "torrent_id"]));
        }
        self.get("/title", &query.to_params()).await
    }

    #[instrument(skip(self, params), fields(base_url = %self.base_url))]
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<T> {
        let url = format!("{}{endpoint}", self.base_url);
        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "response received");

        let parsed: std::result::Result<Value, _> = serde_json::from_str(&body);
        match parsed {
            Ok(value) => {
                if let Some(err) = api_error(&value) {
                    return Err(err);
                }
                if !status.is_success() {
                    return Err(status_error(status.as_u16(), &body));
                }
                Ok(serde_json::from_value(value)?)
            }
            Err(_) if !status.is_success() => Err(status_error(status.as_u16(), &body)),
            Err(e) => Err(HttpError::Decode(e)),
        }
    }
}

/// Extract an `{"error": {"code": .., "message": ..}}` body.
fn api_error(value: &Value) -> Option<HttpError> {
    let error = value.get("error")?.as_object()?;
    Some(HttpError::Api {
        code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    })
}

fn status_error(status: u16, body: &str) -> HttpError {
    let body = match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    };
    HttpError::Status {
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl TitleFetcher for HttpClient {
    async fn fetch_title(&self, id: i64) -> std::result::Result<Title, FetchError> {
        Ok(self.get_title(&TitleQuery::by_id(id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn api_error_extracts_code_and_message() {
        let err = api_error(&json!({"error": {"code": 412, "message": "Unknown parameters"}}));
        assert_matches!(err, Some(HttpError::Api { code: 412, message }) if message == "Unknown parameters");
    }

    #[test]
    fn api_error_ignores_regular_bodies() {
        assert!(api_error(&json!({"id": 1, "error": null})).is_none());
        assert!(api_error(&json!([1, 2])).is_none());
    }

    #[test]
    fn status_error_truncates_body() {
        let body = "x".repeat(2000);
        let err = status_error(500, &body);
        assert_matches!(err, HttpError::Status { status: 500, body } if body.len() == MAX_ERROR_BODY);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = HttpClient::new("http://localhost:1/v3/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:1/v3");
    }

    #[test]
    fn invalid_proxy_is_rejected() {
        let settings = HttpSettings {
            proxy: Some("http://[invalid".into()),
            ..HttpSettings::default()
        };
        assert_matches!(HttpClient::from_settings(&settings), Err(HttpError::Request(_)));
    }
}
