//! Paginated, retrying order fetch and best-effort product category lookup.
//!
//! The fetch loop is fail-stop: a page that still fails after
//! [`FetchConfig::max_attempts`] ends the whole loop, and the orders gathered
//! so far are returned with [`FetchStop::Abandoned`]. Because pages are
//! requested oldest-first during incremental sync, a truncated batch is still
//! a contiguous prefix and the watermark stays correct.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::contract::{Order, OrderQuery, OrderSource, SortDirection};
use crate::error::SourceError;
use crate::timefmt;

/// Product id to comma-joined category names. Rebuilt every run.
pub type CategoryLookup = HashMap<u64, String>;

/// One successfully fetched page.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    /// Fewer records than requested, or none at all.
    pub is_last: bool,
}

/// Why the fetch loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStop {
    LastPage,
    Cap,
    Abandoned { page: u32, error: String },
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub orders: Vec<Order>,
    pub pages: u32,
    pub stop: FetchStop,
}

/// Fetch one page, retrying with linear backoff.
pub async fn fetch_orders_page<O>(
    source: &O,
    config: &FetchConfig,
    query: &OrderQuery,
) -> Result<OrderPage, SourceError>
where
    O: OrderSource + ?Sized,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match source.fetch_orders_page(query).await {
            Ok(orders) => {
                let is_last = orders.is_empty() || orders.len() < query.per_page as usize;
                if orders.is_empty() {
                    info!(page = query.page, "Page returned empty data");
                } else {
                    info!(page = query.page, count = orders.len(), "Fetched page");
                }
                return Ok(OrderPage { orders, is_last });
            }
            Err(e) if attempt < config.max_attempts => {
                let backoff = config.backoff_step * attempt;
                warn!(
                    page = query.page,
                    attempt,
                    error = %e,
                    backoff_secs = backoff.as_secs(),
                    "Page fetch failed, retrying"
                );
                sleep(backoff).await;
            }
            Err(e) => {
                warn!(page = query.page, attempt, error = %e, "Giving up on page");
                return Err(e);
            }
        }
    }
}

/// Walk pages from 1 until the last page, the order cap, or an abandoned page.
pub async fn fetch_orders<O>(
    source: &O,
    config: &FetchConfig,
    after: Option<DateTime<FixedOffset>>,
    direction: SortDirection,
) -> FetchOutcome
where
    O: OrderSource + ?Sized,
{
    let mut orders: Vec<Order> = Vec::new();
    let mut page = 1;
    let mut pages = 0;

    let stop = loop {
        let query = OrderQuery {
            page,
            per_page: config.page_size,
            after,
            direction,
        };
        let fetched = match fetch_orders_page(source, config, &query).await {
            Ok(p) => p,
            Err(e) => {
                break FetchStop::Abandoned {
                    page,
                    error: e.to_string(),
                };
            }
        };
        pages += 1;
        orders.extend(fetched.orders);

        // Whole pages only: the watermark must never land inside a page.
        if orders.len() >= config.max_orders {
            info!(
                max_orders = config.max_orders,
                fetched = orders.len(),
                "Reached order cap"
            );
            break FetchStop::Cap;
        }
        if fetched.is_last {
            break FetchStop::LastPage;
        }

        page += 1;
        if config.cooldown_every > 0 && page % config.cooldown_every == 0 {
            info!(
                page,
                cooldown_secs = config.cooldown.as_secs(),
                "Cooling down to avoid rate limit"
            );
            sleep(config.cooldown).await;
        }
    };

    info!(total = orders.len(), pages, stop = ?stop, "Order fetch finished");
    FetchOutcome {
        orders,
        pages,
        stop,
    }
}

/// Re-validate fetched orders: drop failed and draft orders, orders without a
/// readable creation time, and (when a boundary is given) every order not
/// created strictly after it.
pub fn filter_orders(orders: Vec<Order>, boundary: Option<DateTime<Tz>>, tz: Tz) -> Vec<Order> {
    orders
        .into_iter()
        .filter(|order| {
            if order.status.is_excluded() {
                debug!(order_id = order.id, status = order.status.as_str(), "Dropping order by status");
                return false;
            }
            let Some(created) = order.date_created.as_ref() else {
                warn!(order_id = order.id, "Dropping order without a readable creation date");
                return false;
            };
            match boundary {
                Some(boundary) if timefmt::localize(created, tz) <= boundary => {
                    debug!(order_id = order.id, %created, "Dropping order at or before boundary");
                    false
                }
                _ => true,
            }
        })
        .collect()
}

/// Look up categories for every distinct product referenced by `orders`.
/// A failed lookup yields an empty category string for that product.
pub async fn fetch_product_categories<O>(source: &O, orders: &[Order]) -> CategoryLookup
where
    O: OrderSource + ?Sized,
{
    let product_ids: BTreeSet<u64> = orders
        .iter()
        .flat_map(|o| o.line_items.iter().map(|item| item.product_id))
        .collect();

    let mut lookup = CategoryLookup::with_capacity(product_ids.len());
    for product_id in product_ids {
        let categories = match source.fetch_product(product_id).await {
            Ok(product) => product.category_names(),
            Err(e) => {
                warn!(product_id, error = %e, "Category lookup failed, leaving empty");
                String::new()
            }
        };
        lookup.insert(product_id, categories);
    }
    info!(products = lookup.len(), "Product categories resolved");
    lookup
}
