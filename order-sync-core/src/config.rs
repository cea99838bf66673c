use std::time::Duration;

use chrono_tz::Tz;
use tracing::{debug, info};

use crate::aggregate::OrderCounting;

/// Everything a sync run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Store timezone; order timestamps are store-local wall clock times.
    pub timezone: Tz,
    pub fetch: FetchConfig,
    pub sheets: SheetLayout,
    pub order_upload: UploadPolicy,
    pub customer_upload: UploadPolicy,
    pub counting: OrderCounting,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            fetch: FetchConfig::default(),
            sheets: SheetLayout::default(),
            order_upload: UploadPolicy::orders(),
            customer_upload: UploadPolicy::customers(),
            counting: OrderCounting::default(),
        }
    }
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            timezone = %self.timezone,
            page_size = self.fetch.page_size,
            max_orders = self.fetch.max_orders,
            orders_sheet = %self.sheets.orders,
            customers_sheet = %self.sheets.customers,
            logs_sheet = %self.sheets.logs,
            counting = ?self.counting,
            "Loaded SyncConfig"
        );
        debug!(config = ?self, "SyncConfig loaded (full debug)");
    }
}

/// Pagination, retry and rate-limit settings for the order fetch loop.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub page_size: u32,
    /// Stop once this many orders have been fetched in one run.
    pub max_orders: usize,
    pub max_attempts: u32,
    /// Backoff before retry `n` is `backoff_step * n`.
    pub backoff_step: Duration,
    /// Pause before every page whose number is a multiple of this.
    pub cooldown_every: u32,
    pub cooldown: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_orders: 10_000,
            max_attempts: 5,
            backoff_step: Duration::from_secs(5),
            cooldown_every: 20,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Chunking and retry settings for one kind of append.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub chunk_size: usize,
    pub max_attempts: u32,
    pub backoff_step: Duration,
    /// Pause after each successfully appended chunk.
    pub pause_after_chunk: Duration,
}

impl UploadPolicy {
    pub fn orders() -> Self {
        Self {
            chunk_size: 100,
            max_attempts: 3,
            backoff_step: Duration::from_secs(5),
            pause_after_chunk: Duration::from_secs(1),
        }
    }

    pub fn customers() -> Self {
        Self {
            chunk_size: 1000,
            max_attempts: 3,
            backoff_step: Duration::from_secs(5),
            pause_after_chunk: Duration::ZERO,
        }
    }
}

/// Sheet names inside the spreadsheet, and the ranges derived from them.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    pub orders: String,
    pub customers: String,
    pub logs: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            orders: "Orders".to_string(),
            customers: "Customers".to_string(),
            logs: "logs".to_string(),
        }
    }
}

impl SheetLayout {
    /// The whole order table, header included.
    pub fn orders_table(&self) -> String {
        self.orders.clone()
    }

    pub fn orders_append(&self) -> String {
        format!("{}!A2", self.orders)
    }

    /// Every data row below the header.
    pub fn orders_body(&self) -> String {
        format!("{}!A2:Z", self.orders)
    }

    pub fn customers_append(&self) -> String {
        format!("{}!A2", self.customers)
    }

    pub fn customers_body(&self) -> String {
        format!("{}!A2:Z", self.customers)
    }

    /// The single watermark record. Reads and writes address the same row.
    pub fn watermark_record(&self) -> String {
        format!("{}!A2:G2", self.logs)
    }
}
