//! WooCommerce REST client implementing [`OrderSource`].
//!
//! Orders are queried with the consumer key pair as query parameters; product
//! lookups use HTTP basic auth with the same pair. Each call performs exactly
//! one request; retry and pagination policy live in `order_sync_core::fetch`.

use async_trait::async_trait;
use chrono::SecondsFormat;
use order_sync_core::contract::{Order, OrderQuery, OrderSource, Product};
use order_sync_core::error::SourceError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::load_config::Credentials;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; order-sync)";
const API_PREFIX: &str = "wp-json/wc/v3";

pub struct WooCommerceClient {
    http: Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
}

impl WooCommerceClient {
    pub fn new(
        base_url: &str,
        consumer_key: &str,
        consumer_secret: &str,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()?;
        tracing::info!(base_url, "Initialized WooCommerce client");
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
        })
    }

    pub fn from_credentials(credentials: &Credentials) -> Result<Self, reqwest::Error> {
        Self::new(
            &credentials.store_url,
            &credentials.consumer_key,
            &credentials.consumer_secret,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, API_PREFIX, path)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| SourceError::Transport(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode(e.to_string()))
}

#[async_trait]
impl OrderSource for WooCommerceClient {
    async fn fetch_orders_page(&self, query: &OrderQuery) -> Result<Vec<Order>, SourceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("consumer_key", self.consumer_key.clone()),
            ("consumer_secret", self.consumer_secret.clone()),
            ("per_page", query.per_page.to_string()),
            ("page", query.page.to_string()),
            ("orderby", "date".to_string()),
            ("order", query.direction.as_query().to_string()),
        ];
        if let Some(after) = query.after {
            params.push(("after", after.to_rfc3339_opts(SecondsFormat::Secs, false)));
        }

        tracing::debug!(page = query.page, per_page = query.per_page, "Requesting orders page");
        let response = self
            .http
            .get(self.url("orders"))
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        decode(response).await
    }

    async fn fetch_product(&self, product_id: u64) -> Result<Product, SourceError> {
        let response = self
            .http
            .get(self.url(&format!("products/{product_id}")))
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        decode(response).await
    }
}
