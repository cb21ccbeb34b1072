use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::auth::TokenProvider;
use super::types::{BatchUpdateRequest, SpreadsheetMetadata, UpdateValuesResponse, ValueRange};
use super::ExportTarget;
use crate::config::{RequestConfig, SheetsConfig};
use crate::error::{SheetsError, SheetsResult};

/// Client for the Google Sheets v4 REST API, scoped to one spreadsheet
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    auth: Arc<TokenProvider>,
    request_config: RequestConfig,
}

impl SheetsClient {
    /// Create a new Sheets client
    pub fn new(config: &SheetsConfig, request_config: RequestConfig) -> SheetsResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(SheetsError::Http)?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| SheetsError::InvalidUrl {
            message: format!("{}: {}", base_url, e),
        })?;

        let auth = TokenProvider::new(&config.credentials, client.clone(), request_config.timeout_ms)?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: config.spreadsheet_id.clone(),
            auth: Arc::new(auth),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Spreadsheet this client writes to
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Build `{base}/v4/spreadsheets/{segments...}` with each segment escaped
    fn url(&self, segments: &[&str]) -> SheetsResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| SheetsError::InvalidUrl {
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidUrl {
                message: format!("{} cannot be a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    /// Send a request and turn non-2xx statuses into errors
    async fn send(&self, operation: &str, request: RequestBuilder) -> SheetsResult<Response> {
        let token = self.auth.access_token().await?;
        let start = Instant::now();

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SheetsError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    SheetsError::Http(e)
                }
            })?;

        let status = response.status();
        debug!(
            operation,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis(),
            "Sheets API call finished"
        );

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ExportTarget for SheetsClient {
    async fn list_tabs(&self) -> SheetsResult<Vec<String>> {
        let url = self.url(&[self.spreadsheet_id.as_str()])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);

        let metadata: SpreadsheetMetadata = self
            .send("spreadsheets.get", request)
            .await?
            .json()
            .await
            .map_err(|e| SheetsError::InvalidResponse {
                message: format!("Failed to parse spreadsheet metadata: {}", e),
            })?;

        Ok(metadata.titles())
    }

    async fn add_tab(&self, title: &str) -> SheetsResult<()> {
        let url = self.url(&[format!("{}:batchUpdate", self.spreadsheet_id).as_str()])?;
        let request = self
            .client
            .post(url)
            .json(&BatchUpdateRequest::add_sheet(title));

        self.send("spreadsheets.batchUpdate", request).await?;
        info!(tab = %title, "Created sheet tab");
        Ok(())
    }

    async fn clear_tab(&self, tab: &str) -> SheetsResult<()> {
        let url = self.url(&[
            self.spreadsheet_id.as_str(),
            "values",
            format!("{}:clear", tab).as_str(),
        ])?;
        let request = self.client.post(url).json(&serde_json::json!({}));

        self.send("values.clear", request).await?;
        Ok(())
    }

    async fn write_rows(&self, tab: &str, rows: &[Vec<String>]) -> SheetsResult<usize> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", tab])?;
        let body = ValueRange::rows(tab, rows.to_vec());
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);

        let response = self.send("values.update", request).await?;

        // The body is informational only; an empty or odd one is not an error
        let updated: UpdateValuesResponse = response.json().await.unwrap_or_default();
        Ok(updated
            .updated_rows
            .map(|n| n as usize)
            .unwrap_or(rows.len()))
    }
}
