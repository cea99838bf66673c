//! High-level pipelines: order sync (incremental or full rebuild) and customer sync.
//!
//! Order sync walks a linear sequence of stages:
//!
//! `ReadWatermark → Fetch → Filter → Enrich → Flatten → Upload → AdvanceWatermark`
//!
//! - A missing or unreadable watermark aborts the incremental run before any
//!   request to the storefront. Bootstrap with [`SyncMode::FullRebuild`].
//! - No orders after filtering is a clean no-op ([`OrderSyncOutcome::NoNewOrders`]).
//! - The watermark is written only after every chunk has been appended. A
//!   failed chunk stops the run; chunks already appended stay in the sheet
//!   and will be appended again by the next run.
//!
//! Customer sync reads the whole order table, aggregates it, clears the
//! customer table body and rewrites it.
//!
//! Neither pipeline takes a lock: concurrent runs against the same
//! spreadsheet must be serialised by whoever schedules them.

use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::aggregate::{self, Aggregation};
use crate::config::SyncConfig;
use crate::contract::{OrderSource, SortDirection, TabularStore};
use crate::error::{SyncError, WatermarkError};
use crate::fetch::{self, FetchStop};
use crate::flatten::{self, OrderRow};
use crate::sink::TabularSink;
use crate::watermark::{Watermark, WatermarkStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Fetch only orders created after the watermark and append them.
    Incremental,
    /// Clear the order table, fetch from the beginning, append, and write a fresh watermark.
    FullRebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ReadWatermark,
    Fetch,
    Filter,
    Enrich,
    Flatten,
    Upload,
    AdvanceWatermark,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderSyncOutcome {
    NoNewOrders,
    Synced { watermark: Watermark },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSyncReport {
    pub run_id: Uuid,
    pub mode: SyncMode,
    pub pages_fetched: u32,
    pub orders_fetched: usize,
    pub orders_kept: usize,
    pub orders_without_items: usize,
    pub fetch_stop: Option<FetchStop>,
    pub rows_appended: usize,
    pub chunks_uploaded: usize,
    pub outcome: OrderSyncOutcome,
}

impl OrderSyncReport {
    fn new(run_id: Uuid, mode: SyncMode) -> Self {
        Self {
            run_id,
            mode,
            pages_fetched: 0,
            orders_fetched: 0,
            orders_kept: 0,
            orders_without_items: 0,
            fetch_stop: None,
            rows_appended: 0,
            chunks_uploaded: 0,
            outcome: OrderSyncOutcome::NoNewOrders,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSyncReport {
    pub run_id: Uuid,
    pub rows_read: usize,
    pub registered_customers: usize,
    pub guest_customers: usize,
    pub rows_written: usize,
    pub chunks_uploaded: usize,
}

pub async fn sync_orders<O, S>(
    config: &SyncConfig,
    mode: SyncMode,
    source: &O,
    store: &S,
) -> Result<OrderSyncReport, SyncError>
where
    O: OrderSource + ?Sized,
    S: TabularStore + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("order_sync", %run_id, ?mode);
    run_order_sync(config, mode, source, store, run_id)
        .instrument(span)
        .await
}

async fn run_order_sync<O, S>(
    config: &SyncConfig,
    mode: SyncMode,
    source: &O,
    store: &S,
    run_id: Uuid,
) -> Result<OrderSyncReport, SyncError>
where
    O: OrderSource + ?Sized,
    S: TabularStore + ?Sized,
{
    let tz = config.timezone;
    let sink = TabularSink::new(store);
    let watermarks = WatermarkStore::new(store, &config.sheets, tz);
    let mut report = OrderSyncReport::new(run_id, mode);

    info!(stage = ?SyncStage::ReadWatermark, "[SYNC] Starting order sync");
    let previous = match mode {
        SyncMode::Incremental => match watermarks.read().await {
            Ok(Some(w)) => Some(w),
            Ok(None) => {
                error!("[SYNC][ABORT] No logs found; run a full rebuild to bootstrap");
                return Err(WatermarkError::Missing.into());
            }
            Err(e) => {
                error!(error = %e, "[SYNC][ABORT] Could not read watermark");
                return Err(e.into());
            }
        },
        SyncMode::FullRebuild => None,
    };
    let boundary = previous.as_ref().map(Watermark::boundary);
    if let Some(boundary) = boundary {
        info!(after = %boundary.to_rfc3339(), "[SYNC] Fetching orders after boundary");
    }

    info!(stage = ?SyncStage::Fetch, "[SYNC] Fetching orders");
    let fetched = fetch::fetch_orders(
        source,
        &config.fetch,
        boundary.map(|b| b.fixed_offset()),
        SortDirection::Ascending,
    )
    .await;
    report.pages_fetched = fetched.pages;
    report.orders_fetched = fetched.orders.len();
    if let FetchStop::Abandoned { page, error } = &fetched.stop {
        warn!(page, error = %error, "[SYNC] Fetch stopped early; continuing with orders fetched so far");
    }
    report.fetch_stop = Some(fetched.stop);
    if fetched.orders.is_empty() {
        info!("[SYNC] No new orders to process");
        return Ok(report);
    }

    info!(stage = ?SyncStage::Filter, "[SYNC] Filtering by creation date and status");
    let orders = fetch::filter_orders(fetched.orders, boundary, tz);
    report.orders_kept = orders.len();
    report.orders_without_items = orders.iter().filter(|o| o.line_items.is_empty()).count();
    info!(kept = orders.len(), "[SYNC] Total orders after filtering");
    if orders.is_empty() {
        info!("[SYNC] No new orders after filtering");
        return Ok(report);
    }

    info!(stage = ?SyncStage::Enrich, "[SYNC] Resolving product categories");
    let categories = fetch::fetch_product_categories(source, &orders).await;

    info!(stage = ?SyncStage::Flatten, "[SYNC] Flattening orders into rows");
    let mut rows: Vec<OrderRow> = flatten::flatten_orders(&orders, &categories);
    flatten::sort_chronologically(&mut rows);
    let Some(next) = rows.last().and_then(|row| Watermark::from_order_row(row, tz)) else {
        info!("[SYNC] Filtered orders produced no rows");
        return Ok(report);
    };
    if let Some(previous) = &previous {
        if next.created <= previous.created {
            warn!(
                previous = %previous.created,
                next = %next.created,
                "[SYNC] New batch does not move the watermark forward; skipping"
            );
            return Ok(report);
        }
    }

    if mode == SyncMode::FullRebuild {
        sink.clear(&config.sheets.orders_body()).await?;
    }

    info!(stage = ?SyncStage::Upload, rows = rows.len(), "[SYNC] Uploading rows");
    let cells: Vec<Vec<String>> = rows.iter().map(OrderRow::to_cells).collect();
    let appended = sink
        .append_chunked(&config.sheets.orders_append(), &cells, &config.order_upload)
        .await
        .map_err(|e| {
            error!(error = %e, "[SYNC][ERROR] Upload incomplete; watermark not advanced");
            e
        })?;
    report.rows_appended = appended.rows;
    report.chunks_uploaded = appended.chunks;

    info!(stage = ?SyncStage::AdvanceWatermark, "[SYNC] Advancing watermark");
    watermarks.write(&next).await?;
    info!(rows = report.rows_appended, "[SYNC] Order sync complete");
    report.outcome = OrderSyncOutcome::Synced { watermark: next };
    Ok(report)
}

pub async fn sync_customers<S>(config: &SyncConfig, store: &S) -> Result<CustomerSyncReport, SyncError>
where
    S: TabularStore + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("customer_sync", %run_id);
    run_customer_sync(config, store, run_id).instrument(span).await
}

async fn run_customer_sync<S>(
    config: &SyncConfig,
    store: &S,
    run_id: Uuid,
) -> Result<CustomerSyncReport, SyncError>
where
    S: TabularStore + ?Sized,
{
    let sink = TabularSink::new(store);
    let mut report = CustomerSyncReport {
        run_id,
        rows_read: 0,
        registered_customers: 0,
        guest_customers: 0,
        rows_written: 0,
        chunks_uploaded: 0,
    };

    info!("[SYNC] Reading order table");
    let table = sink.read(&config.sheets.orders_table()).await?;
    let records = aggregate::parse_order_table(&table)?;
    report.rows_read = records.len();
    if records.is_empty() {
        info!("[SYNC] No order data found; customer table left untouched");
        return Ok(report);
    }

    let aggregation: Aggregation = aggregate::aggregate_customers(&records, config.counting);
    report.registered_customers = aggregation.registered.len();
    report.guest_customers = aggregation.guests.len();
    info!(
        registered = report.registered_customers,
        guests = report.guest_customers,
        counting = ?config.counting,
        "[SYNC] Aggregated customers"
    );

    sink.clear(&config.sheets.customers_body()).await?;
    let appended = sink
        .append_chunked(
            &config.sheets.customers_append(),
            &aggregation.to_rows(),
            &config.customer_upload,
        )
        .await?;
    report.rows_written = appended.rows;
    report.chunks_uploaded = appended.chunks;
    info!(customers = report.rows_written, "[SYNC] Customer sync complete");
    Ok(report)
}
