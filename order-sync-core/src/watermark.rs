//! The sync watermark: the last synced order, persisted as a single row in
//! the logs sheet. Rows below the record are ignored.
//!
//! Row layout: `[order id, date created, date paid, customer id, name, email, timezone]`.
//! Only the creation time drives fetch boundaries; the other fields are kept
//! for operators reading the sheet.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::config::SheetLayout;
use crate::contract::TabularStore;
use crate::error::{StoreError, WatermarkError};
use crate::flatten::OrderRow;
use crate::timefmt;

const CREATED_COLUMN: usize = 1;
const TIMEZONE_COLUMN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub order_id: String,
    pub created: DateTime<Tz>,
    pub date_paid: String,
    pub customer_id: String,
    pub name: String,
    pub email: String,
}

impl Watermark {
    /// Parse a logs row. The creation time is normalised into `tz`.
    pub fn from_row(row: &[String], tz: Tz) -> Result<Self, WatermarkError> {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        let raw_created = cell(CREATED_COLUMN);
        let created = timefmt::parse_in_zone(&raw_created, tz)
            .ok_or(WatermarkError::InvalidCreated(raw_created))?;

        let label = cell(TIMEZONE_COLUMN);
        if !label.is_empty() && label != tz.name() {
            warn!(logged = %label, configured = %tz, "Watermark timezone label differs from store timezone");
        }

        Ok(Self {
            order_id: cell(0),
            created,
            date_paid: cell(2),
            customer_id: cell(3),
            name: cell(4),
            email: cell(5),
        })
    }

    /// Watermark for the newest row of a chronologically sorted batch.
    pub fn from_order_row(row: &OrderRow, tz: Tz) -> Option<Self> {
        let created = timefmt::localize(row.date_created.as_ref()?, tz);
        Some(Self {
            order_id: row.order_id.to_string(),
            created,
            date_paid: timefmt::format_sheet_opt(row.date_paid.as_ref()),
            customer_id: row.customer_id.to_string(),
            name: row.name.clone(),
            email: row.email.clone().unwrap_or_default(),
        })
    }

    /// Inclusive-after bound for the next fetch: one second past the
    /// watermark, so the last synced order is not fetched again.
    pub fn boundary(&self) -> DateTime<Tz> {
        self.created + Duration::seconds(1)
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.order_id.clone(),
            timefmt::format_sheet(&self.created.naive_local()),
            self.date_paid.clone(),
            self.customer_id.clone(),
            self.name.clone(),
            self.email.clone(),
            self.created.timezone().name().to_string(),
        ]
    }
}

/// Reads and writes the watermark row through a [`TabularStore`].
pub struct WatermarkStore<'a, S: ?Sized> {
    store: &'a S,
    layout: &'a SheetLayout,
    tz: Tz,
}

impl<'a, S> WatermarkStore<'a, S>
where
    S: TabularStore + ?Sized,
{
    pub fn new(store: &'a S, layout: &'a SheetLayout, tz: Tz) -> Self {
        Self { store, layout, tz }
    }

    /// `Ok(None)` means no sync has ever been logged.
    pub async fn read(&self) -> Result<Option<Watermark>, WatermarkError> {
        let rows = self.store.get(&self.layout.watermark_record()).await?;
        let Some(record) = rows.first().filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        else {
            return Ok(None);
        };
        let watermark = Watermark::from_row(record, self.tz)?;
        info!(
            order_id = %watermark.order_id,
            created = %watermark.created,
            "Read sync watermark"
        );
        Ok(Some(watermark))
    }

    pub async fn write(&self, watermark: &Watermark) -> Result<(), StoreError> {
        self.store
            .update(&self.layout.watermark_record(), &[watermark.to_row()])
            .await?;
        info!(
            order_id = %watermark.order_id,
            created = %watermark.created,
            "Advanced sync watermark"
        );
        Ok(())
    }
}
