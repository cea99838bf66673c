#![doc = "Google Sheets v4 values API client implementing the core TabularStore trait."]
//
//! # Sheets integration
//!
//! Bridges [`TabularStore`] to the spreadsheet REST API:
//!
//! - `get` → `GET values/{range}`
//! - `append` → `POST values/{range}:append` with `INSERT_ROWS`
//! - `update` → `PUT values/{range}`
//! - `clear` → `POST values/{range}:clear`
//!
//! Writes use `valueInputOption=USER_ENTERED`, so the sheet parses dates and
//! numbers the way it would for typed input.
//!
//! Authentication is a bearer access token supplied from the environment;
//! obtaining and refreshing it is outside this crate.

use async_trait::async_trait;
use order_sync_core::contract::TabularStore;
use order_sync_core::error::StoreError;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::load_config::Credentials;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ValueBody<'a> {
    values: &'a [Vec<String>],
}

pub struct SheetsClient {
    http: Client,
    base_url: Url,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        access_token: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let base_url = Url::parse(base_url)?;
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        tracing::info!(
            %base_url,
            spreadsheet_id,
            token_set = !access_token.is_empty(),
            "Initialized Sheets client"
        );
        Ok(Self {
            http,
            base_url,
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn from_credentials(
        credentials: &Credentials,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::new(
            DEFAULT_BASE_URL,
            &credentials.sheet_id,
            &credentials.sheets_access_token,
        )
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}{suffix}` with the range percent-encoded.
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Sheets API returned error");
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn get(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.values_url(range, "")?;
        tracing::debug!(range, "Reading values");
        let response = self.send(self.http.get(url)).await?;
        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append(&self, range: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let url = self.values_url(range, ":append")?;
        tracing::debug!(range, rows = rows.len(), "Appending values");
        self.send(
            self.http
                .post(url)
                .query(&[
                    ("valueInputOption", "USER_ENTERED"),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&ValueBody { values: rows }),
        )
        .await?;
        Ok(())
    }

    async fn update(&self, range: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let url = self.values_url(range, "")?;
        tracing::debug!(range, rows = rows.len(), "Updating values");
        self.send(
            self.http
                .put(url)
                .query(&[("valueInputOption", "USER_ENTERED")])
                .json(&ValueBody { values: rows }),
        )
        .await?;
        Ok(())
    }

    async fn clear(&self, range: &str) -> Result<(), StoreError> {
        let url = self.values_url(range, ":clear")?;
        tracing::debug!(range, "Clearing values");
        self.send(self.http.post(url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }
}
