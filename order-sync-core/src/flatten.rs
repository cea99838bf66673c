//! Order flattening: one output row per (order, line item) pair.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::contract::{Order, OrderStatus};
use crate::fetch::CategoryLookup;
use crate::timefmt;

/// Column order of the order table.
pub const ORDER_COLUMNS: [&str; 14] = [
    "Order ID",
    "Date Created",
    "Date Paid",
    "Status",
    "Customer ID",
    "Name",
    "Email",
    "Product ID",
    "Product Name",
    "Category",
    "Total Amount",
    "Total Discount",
    "Payment Method",
    "Payment Method Title",
];

/// A denormalised order table row. Order-level fields repeat on every line item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: u64,
    pub date_created: Option<NaiveDateTime>,
    pub date_paid: Option<NaiveDateTime>,
    pub status: OrderStatus,
    pub customer_id: u64,
    pub name: String,
    pub email: Option<String>,
    pub product_id: u64,
    pub product_name: Option<String>,
    pub category: String,
    pub total_amount: Option<String>,
    pub total_discount: Option<String>,
    pub payment_method: Option<String>,
    pub payment_method_title: Option<String>,
}

impl OrderRow {
    /// Serialise to store cells in [`ORDER_COLUMNS`] order.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.order_id.to_string(),
            timefmt::format_sheet_opt(self.date_created.as_ref()),
            timefmt::format_sheet_opt(self.date_paid.as_ref()),
            self.status.as_str().to_string(),
            self.customer_id.to_string(),
            self.name.clone(),
            self.email.clone().unwrap_or_default(),
            self.product_id.to_string(),
            self.product_name.clone().unwrap_or_default(),
            self.category.clone(),
            self.total_amount.clone().unwrap_or_default(),
            self.total_discount.clone().unwrap_or_default(),
            self.payment_method.clone().unwrap_or_default(),
            self.payment_method_title.clone().unwrap_or_default(),
        ]
    }
}

/// Billing first and last name joined by a single space, trimmed.
pub fn billing_name(order: &Order) -> String {
    format!(
        "{} {}",
        order.billing.first_name.as_deref().unwrap_or(""),
        order.billing.last_name.as_deref().unwrap_or("")
    )
    .trim()
    .to_string()
}

/// Expand every order into one row per line item, joining in categories.
/// Orders without line items produce no rows.
pub fn flatten_orders(orders: &[Order], categories: &CategoryLookup) -> Vec<OrderRow> {
    let mut rows = Vec::with_capacity(orders.iter().map(|o| o.line_items.len()).sum());
    for order in orders {
        if order.line_items.is_empty() {
            warn!(order_id = order.id, "Order has no line items, producing no rows");
            continue;
        }
        let name = billing_name(order);
        for item in &order.line_items {
            rows.push(OrderRow {
                order_id: order.id,
                date_created: order.date_created,
                date_paid: order.date_paid,
                status: order.status.clone(),
                customer_id: order.customer_id,
                name: name.clone(),
                email: order.billing.email.clone(),
                product_id: item.product_id,
                product_name: item.name.clone(),
                category: categories.get(&item.product_id).cloned().unwrap_or_default(),
                total_amount: order.total.clone(),
                total_discount: order.discount_total.clone(),
                payment_method: order.payment_method.clone(),
                payment_method_title: order.payment_method_title.clone(),
            });
        }
    }
    rows
}

/// Stable ascending sort by creation time; rows without one go last.
pub fn sort_chronologically(rows: &mut [OrderRow]) {
    rows.sort_by_key(|row| (row.date_created.is_none(), row.date_created));
}
