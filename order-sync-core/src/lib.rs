#![doc = "order-sync-core: core logic library for order-sync."]

//! This crate contains the incremental sync engine: the typed storefront
//! wire model, the paginated fetch loop, order flattening, the sync
//! watermark, customer aggregation and the chunked tabular sink.
//! Credentials and concrete HTTP clients live in the `order-sync` binary crate.
//!
//! # Usage
//! Implement [`contract::OrderSource`] and [`contract::TabularStore`] for your
//! backends and hand them to [`synchronise::sync_orders`] or
//! [`synchronise::sync_customers`].

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod sink;
pub mod synchronise;
pub mod timefmt;
pub mod watermark;
