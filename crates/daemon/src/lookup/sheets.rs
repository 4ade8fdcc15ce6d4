//! Google Sheets `values.get` implementation of [`TabularSource`].

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{SourceError, TabularSource};
use crate::config::LookupConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Reads one A1 range of a spreadsheet.
#[derive(Clone)]
pub struct GoogleSheets {
    client: Client,
    endpoint: Url,
}

impl std::fmt::Debug for GoogleSheets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut redacted = self.endpoint.clone();
        redacted.set_query(None);
        f.debug_struct("GoogleSheets")
            .field("endpoint", &redacted.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GoogleSheets {
    /// Build a client for the configured spreadsheet range.
    pub fn new(config: &LookupConfig) -> Result<Self, SourceError> {
        let endpoint = values_url(config)?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

/// `{api_base}/{spreadsheet_id}/values/{range}?key={api_key}`
fn values_url(config: &LookupConfig) -> Result<Url, SourceError> {
    let mut url = Url::parse(config.api_base.trim_end_matches('/'))
        .map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| SourceError::InvalidUrl(config.api_base.clone()))?
        .pop_if_empty()
        .push(config.spreadsheet_id.trim())
        .push("values")
        .push(&config.range);
    if !config.api_key.is_empty() {
        url.query_pairs_mut().append_pair("key", &config.api_key);
    }
    Ok(url)
}

impl TabularSource for GoogleSheets {
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, SourceError> {
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }
        let range: ValueRange = response.json().await?;
        Ok(range.values)
    }
}
