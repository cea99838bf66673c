#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use order_sync_core::contract::{Billing, LineItem, Order, OrderStatus};

pub fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

/// A completed order with one line item per product id.
pub fn order(id: u64, created: NaiveDateTime, products: &[u64]) -> Order {
    Order {
        id,
        date_created: Some(created),
        date_paid: Some(created + chrono::Duration::seconds(5)),
        status: OrderStatus::Completed,
        customer_id: 7,
        billing: Billing {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
        },
        payment_method: Some("stripe".to_string()),
        payment_method_title: Some("Credit Card".to_string()),
        total: Some("42.50".to_string()),
        discount_total: Some("2.50".to_string()),
        line_items: products
            .iter()
            .map(|p| LineItem {
                product_id: *p,
                name: Some(format!("Product {p}")),
            })
            .collect(),
    }
}

/// `count` single-item orders, one minute apart, starting at `first_id`.
pub fn orders_from(first_id: u64, count: usize, start: NaiveDateTime) -> Vec<Order> {
    (0..count)
        .map(|i| {
            order(
                first_id + i as u64,
                start + chrono::Duration::minutes(i as i64),
                &[100],
            )
        })
        .collect()
}

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}
