use super::google_auth::AccessTokenSourceRef;
use crate::domain::ports::RowStore;
use crate::domain::registration::RegistrationRow;
use crate::error::{RegistrationError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "spreadsheet";
pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";

/// Google Sheets (v4 values API) backed row store.
///
/// The first row of `range` is the header; rows are matched to columns by
/// header name. Bearer tokens come from an [`AccessTokenSource`]; a request
/// rejected with 401 is retried once with a fresh token.
///
/// [`AccessTokenSource`]: super::google_auth::AccessTokenSource
pub struct SheetsRowStore {
    client: Client,
    api_url: String,
    sheet_id: String,
    range: String,
    tokens: AccessTokenSourceRef,
    timeout: Duration,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsRowStore {
    pub fn new(
        api_url: impl Into<String>,
        sheet_id: impl Into<String>,
        range: impl Into<String>,
        tokens: AccessTokenSourceRef,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| RegistrationError::from_http(SERVICE, timeout, e))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            sheet_id: sheet_id.into(),
            range: range.into(),
            tokens,
            timeout,
        })
    }

    fn values_url(&self, last_segment: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| RegistrationError::ConfigError(format!("invalid sheets API url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| RegistrationError::ConfigError("sheets API url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.sheet_id.as_str(), "values", last_segment]);
        Ok(url)
    }

    async fn send_authorized(&self, request: impl Fn(&str) -> RequestBuilder) -> Result<Response> {
        let token = self.tokens.access_token().await?;
        let response = request(&token)
            .send()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(sheet_id = %self.sheet_id, "Access token rejected, refreshing");
        self.tokens.invalidate().await;
        let token = self.tokens.access_token().await?;
        request(&token)
            .send()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))
    }

    async fn fetch(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(range)?;
        let response = self
            .send_authorized(|token| self.client.get(url.clone()).bearer_auth(token))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrationError::upstream(
                SERVICE,
                format!("read failed (status={status}): {body}"),
            ));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;
        Ok(range.values)
    }
}

/// Turns raw sheet values into rows, using the first line as the header.
fn rows_from_values(values: Vec<Vec<String>>) -> Vec<RegistrationRow> {
    let mut lines = values.into_iter();
    let Some(headers) = lines.next() else {
        return Vec::new();
    };
    lines
        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|cells| RegistrationRow::from_cells(&headers, &cells))
        .collect()
}

#[async_trait]
impl RowStore for SheetsRowStore {
    async fn append(&self, row: RegistrationRow) -> Result<()> {
        let header = self
            .fetch(&format!("{}!1:1", self.range))
            .await?
            .into_iter()
            .next();
        let body = ValueRange {
            values: row.append_lines(header),
        };

        let mut url = self.values_url(&format!("{}:append", self.range))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .send_authorized(|token| self.client.post(url.clone()).bearer_auth(token).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrationError::upstream(
                SERVICE,
                format!("append failed (status={status}): {body}"),
            ));
        }

        debug!(order_id = %row.order_id, "Row appended to sheet");
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<RegistrationRow>> {
        let values = self.fetch(&self.range).await?;
        Ok(rows_from_values(values))
    }
}
