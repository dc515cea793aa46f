//! Socrata-style JSON resource client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tidemark_types::RawRecord;

use super::{PageRequest, PageSource};
use crate::config::SourceConfig;
use crate::errors::ExtractError;

/// Longest response body excerpt carried in a status error.
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP page source for a Socrata dataset resource.
pub struct SocrataClient {
    client: reqwest::Client,
    endpoint: String,
    app_token: Option<String>,
}

impl SocrataClient {
    /// Build a client from the source configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Client`] if the TLS backend cannot be initialised.
    pub fn from_config(config: &SourceConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tidemark/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ExtractError::Client)?;

        if config.app_token.is_none() {
            tracing::warn!("API_APP_TOKEN not set; requests may be throttled");
        }

        Ok(Self {
            client,
            endpoint: config.resolved_endpoint(),
            app_token: config.app_token.clone(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Query string for one page, in the order the API documents them.
pub(crate) fn query_params(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("$limit", request.limit.to_string()),
        ("$offset", request.offset.to_string()),
    ];
    if let Some(filter) = &request.filter {
        params.push(("$where", filter.clone()));
    }
    params
}

/// Turn a decoded body into records, rejecting anything but an array of objects.
pub(crate) fn records_from_body(offset: u64, body: Value) -> Result<Vec<RawRecord>, ExtractError> {
    let Value::Array(items) = body else {
        return Err(ExtractError::Malformed {
            offset,
            reason: "expected a JSON array".to_string(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(ExtractError::Malformed {
                offset,
                reason: format!("element {i} is not an object: {other}"),
            }),
        })
        .collect()
}

#[async_trait]
impl PageSource for SocrataClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawRecord>, ExtractError> {
        let offset = request.offset;
        let mut builder = self
            .client
            .get(&self.endpoint)
            .query(&query_params(request));
        if let Some(token) = &self.app_token {
            builder = builder.header("X-App-Token", token);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| ExtractError::Http { offset, source })?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), offset, "Page response received");

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ExtractError::Status {
                offset,
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|source| ExtractError::Http { offset, source })?;
        records_from_body(offset, body)
    }
}
