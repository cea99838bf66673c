//! # contract: the two external collaborators of the sync engine
//!
//! This module defines the typed storefront wire model (orders, line items,
//! products) and the two traits the engine talks through:
//!
//! - [`OrderSource`]: single-attempt paginated order queries and product lookups.
//! - [`TabularStore`]: `get`/`append`/`update`/`clear` of string rows addressed
//!   by a `{sheet_name}!{cell_range}` locator.
//!
//! Retry, pagination and chunking policy live in [`crate::fetch`] and
//! [`crate::sink`]; implementors only perform one request per call.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`; enable the `test-export-mocks`
//! feature (on by default) to use `MockOrderSource` and `MockTabularStore`
//! from integration tests.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{SourceError, StoreError};

/// Order status as reported by the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    Draft,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
            OrderStatus::Draft => "draft",
            OrderStatus::Other(s) => s,
        }
    }

    /// Failed and draft orders never reach the order table.
    pub fn is_excluded(&self) -> bool {
        matches!(self, OrderStatus::Failed | OrderStatus::Draft)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "on-hold" => OrderStatus::OnHold,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            "failed" => OrderStatus::Failed,
            "draft" => OrderStatus::Draft,
            _ => OrderStatus::Other(s),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Billing {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// A storefront order, validated at the API boundary.
///
/// Timestamps are the store-local wall clock times the storefront reports.
/// A timestamp that fails to parse is kept as `None` so the post-fetch
/// filter can drop the order instead of failing the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    #[serde(default, deserialize_with = "crate::timefmt::deserialize_lenient")]
    pub date_created: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "crate::timefmt::deserialize_lenient")]
    pub date_paid: Option<NaiveDateTime>,
    pub status: OrderStatus,
    /// `0` denotes a guest checkout.
    #[serde(default)]
    pub customer_id: u64,
    #[serde(default)]
    pub billing: Billing,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_method_title: Option<String>,
    /// Monetary totals are carried verbatim as the storefront formats them.
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub discount_total: Option<String>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Product {
    /// Category names joined in the order the storefront lists them.
    pub fn category_names(&self) -> String {
        self.categories
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_query(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// One page request against the order endpoint. Orders are sorted by creation date.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderQuery {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    /// Advisory lower bound; the storefront's filtering is not trusted.
    pub after: Option<DateTime<FixedOffset>>,
    pub direction: SortDirection,
}

/// Paginated read access to the storefront.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Fetch a single page of orders. One request, no retry.
    async fn fetch_orders_page(&self, query: &OrderQuery) -> Result<Vec<Order>, SourceError>;

    /// Fetch a single product by id. One request, no retry.
    async fn fetch_product(&self, product_id: u64) -> Result<Product, SourceError>;
}

/// Row-oriented access to a spreadsheet. All cells travel as strings.
///
/// `range` is a `{sheet_name}!{cell_range}` locator, or a bare sheet name
/// for the whole sheet.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn get(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError>;

    /// Insert rows after the last row of the table found at `range`. Never overwrites.
    async fn append(&self, range: &str, rows: &[Vec<String>]) -> Result<(), StoreError>;

    /// Overwrite exactly `range` with `rows`.
    async fn update(&self, range: &str, rows: &[Vec<String>]) -> Result<(), StoreError>;

    async fn clear(&self, range: &str) -> Result<(), StoreError>;
}
