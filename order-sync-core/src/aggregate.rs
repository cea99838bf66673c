//! Customer aggregation: reduce the whole order table to one summary row per
//! customer identity.
//!
//! Registered customers (`Customer ID != "0"`) are grouped by ID, guests by
//! email. The two sets are summarised separately and concatenated, so an
//! email that has bought both as a guest and as a registered customer yields
//! two rows.
//!
//! The order table holds one row per line item. With
//! [`OrderCounting::LineItems`] every row counts as an order and contributes
//! its order total, which inflates multi-item orders. [`OrderCounting::DistinctOrders`]
//! keeps only the first row of each Order ID before grouping.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::AggregateError;
use crate::timefmt;

pub const GUEST_ID: &str = "0";

/// Column order of the customer table.
pub const CUSTOMER_COLUMNS: [&str; 8] = [
    "Email",
    "ID",
    "First Order Date",
    "Last Order Date",
    "Name",
    "Total Orders",
    "Amount Spent",
    "Total Discount",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderCounting {
    /// Every order table row counts once.
    #[default]
    LineItems,
    /// Rows sharing an Order ID count once.
    DistinctOrders,
}

/// The fields of one order table row the aggregator needs, coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order_id: String,
    pub customer_id: String,
    pub name: Option<String>,
    /// Trimmed and lower-cased.
    pub email: Option<String>,
    pub total_amount: Decimal,
    pub total_discount: Decimal,
    pub date_created: Option<NaiveDateTime>,
}

impl OrderRecord {
    pub fn is_guest(&self) -> bool {
        self.customer_id == GUEST_ID
    }
}

struct Columns {
    order_id: usize,
    customer_id: usize,
    name: usize,
    email: usize,
    total_amount: usize,
    total_discount: usize,
    date_created: usize,
}

impl Columns {
    fn locate(header: &[String]) -> Result<Self, AggregateError> {
        let find = |name: &'static str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(AggregateError::MissingColumn(name))
        };
        Ok(Self {
            order_id: find("Order ID")?,
            customer_id: find("Customer ID")?,
            name: find("Name")?,
            email: find("Email")?,
            total_amount: find("Total Amount")?,
            total_discount: find("Total Discount")?,
            date_created: find("Date Created")?,
        })
    }
}

fn non_empty(cell: Option<&String>) -> Option<String> {
    cell.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn decimal_or_zero(cell: Option<&String>) -> Decimal {
    cell.and_then(|s| s.trim().parse::<Decimal>().ok())
        .unwrap_or(Decimal::ZERO)
}

/// Parse the full order table, header row first. Short rows are padded with
/// empty cells. A table with no data rows yields no records.
pub fn parse_order_table(values: &[Vec<String>]) -> Result<Vec<OrderRecord>, AggregateError> {
    let Some((header, rows)) = values.split_first() else {
        return Ok(Vec::new());
    };
    let cols = Columns::locate(header)?;

    Ok(rows
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| OrderRecord {
            order_id: non_empty(row.get(cols.order_id)).unwrap_or_default(),
            customer_id: non_empty(row.get(cols.customer_id))
                .unwrap_or_else(|| GUEST_ID.to_string()),
            name: non_empty(row.get(cols.name)),
            email: non_empty(row.get(cols.email)).map(|e| e.to_lowercase()),
            total_amount: decimal_or_zero(row.get(cols.total_amount)),
            total_discount: decimal_or_zero(row.get(cols.total_discount)),
            date_created: row
                .get(cols.date_created)
                .and_then(|s| timefmt::parse_naive(s)),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSummary {
    pub email: Option<String>,
    pub id: String,
    pub first_order: Option<NaiveDateTime>,
    pub last_order: Option<NaiveDateTime>,
    pub name: Option<String>,
    pub total_orders: usize,
    pub amount_spent: Decimal,
    pub total_discount: Decimal,
}

impl CustomerSummary {
    fn seed(id: String) -> Self {
        Self {
            email: None,
            id,
            first_order: None,
            last_order: None,
            name: None,
            total_orders: 0,
            amount_spent: Decimal::ZERO,
            total_discount: Decimal::ZERO,
        }
    }

    fn absorb(&mut self, record: &OrderRecord) {
        if self.name.is_none() {
            self.name = record.name.clone();
        }
        if self.email.is_none() {
            self.email = record.email.clone();
        }
        self.total_orders += 1;
        self.amount_spent += record.total_amount;
        self.total_discount += record.total_discount;
        if let Some(created) = record.date_created {
            self.first_order = Some(self.first_order.map_or(created, |f| f.min(created)));
            self.last_order = Some(self.last_order.map_or(created, |l| l.max(created)));
        }
    }

    /// Serialise to store cells in [`CUSTOMER_COLUMNS`] order; absent values are empty.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.email.clone().unwrap_or_default(),
            self.id.clone(),
            timefmt::format_sheet_opt(self.first_order.as_ref()),
            timefmt::format_sheet_opt(self.last_order.as_ref()),
            self.name.clone().unwrap_or_default(),
            self.total_orders.to_string(),
            self.amount_spent.to_string(),
            self.total_discount.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Ascending by customer ID.
    pub registered: Vec<CustomerSummary>,
    /// Ascending by email. Guests without an email share one group.
    pub guests: Vec<CustomerSummary>,
}

impl Aggregation {
    pub fn len(&self) -> usize {
        self.registered.len() + self.guests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered summaries followed by guest summaries.
    pub fn summaries(&self) -> impl Iterator<Item = &CustomerSummary> {
        self.registered.iter().chain(self.guests.iter())
    }

    pub fn to_rows(&self) -> Vec<Vec<String>> {
        self.summaries().map(CustomerSummary::to_cells).collect()
    }
}

pub fn aggregate_customers(records: &[OrderRecord], counting: OrderCounting) -> Aggregation {
    let mut seen_orders: HashSet<&str> = HashSet::new();
    let mut registered: BTreeMap<String, CustomerSummary> = BTreeMap::new();
    let mut guests: BTreeMap<String, CustomerSummary> = BTreeMap::new();

    for record in records {
        if counting == OrderCounting::DistinctOrders
            && !record.order_id.is_empty()
            && !seen_orders.insert(record.order_id.as_str())
        {
            continue;
        }
        if record.is_guest() {
            let key = record.email.clone().unwrap_or_default();
            guests
                .entry(key)
                .or_insert_with(|| CustomerSummary::seed(GUEST_ID.to_string()))
                .absorb(record);
        } else {
            registered
                .entry(record.customer_id.clone())
                .or_insert_with(|| CustomerSummary::seed(record.customer_id.clone()))
                .absorb(record);
        }
    }

    Aggregation {
        registered: registered.into_values().collect(),
        guests: guests.into_values().collect(),
    }
}
