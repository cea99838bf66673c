///
/// This module implements the CLI interface for order-sync: command parsing,
/// wiring the concrete storefront and spreadsheet clients, and printing run
/// reports.
///
/// All sync logic (fetching, flattening, watermarking, aggregation) lives in
/// the [`order-sync-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - From the shell: `order-sync orders`, `order-sync orders --full-rebuild`,
///   `order-sync customers` or `order-sync all`. See `--help`.
/// - Programmatically: call [`run`] with a constructed [`Cli`].
///
/// [`order-sync-core`]: ../../order-sync-core/
use crate::load_config::{load_config, AppConfig};
use crate::sheets::SheetsClient;
use crate::woocommerce::WooCommerceClient;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use order_sync_core::fetch::FetchStop;
use order_sync_core::synchronise::{
    sync_customers, sync_orders, CustomerSyncReport, OrderSyncOutcome, OrderSyncReport, SyncMode,
};
use std::path::PathBuf;

/// CLI for order-sync: incremental storefront order and customer sync into a spreadsheet.
#[derive(Parser)]
#[clap(
    name = "order-sync",
    version,
    about = "Sync WooCommerce orders and customer summaries into Google Sheets"
)]
pub struct Cli {
    /// Optional YAML file with sheet names and upload tuning (no secrets)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append orders created since the last sync and advance the watermark
    Orders {
        /// Clear the order table and re-sync from the first order; bootstraps the watermark
        #[clap(long)]
        full_rebuild: bool,
    },
    /// Rebuild the customer summary table from the order table
    Customers,
    /// Incremental order sync followed by customer sync
    All,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Orders { full_rebuild } => {
            let mode = if full_rebuild {
                SyncMode::FullRebuild
            } else {
                SyncMode::Incremental
            };
            run_orders(&config, mode).await
        }
        Commands::Customers => run_customers(&config).await,
        Commands::All => {
            run_orders(&config, SyncMode::Incremental).await?;
            run_customers(&config).await
        }
    }
}

fn sheets_client(config: &AppConfig) -> Result<SheetsClient> {
    SheetsClient::from_credentials(&config.credentials)
        .map_err(|e| anyhow!("Failed to construct Sheets client: {e}"))
}

async fn run_orders(config: &AppConfig, mode: SyncMode) -> Result<()> {
    tracing::info!(command = "orders", ?mode, "Starting order sync");
    let source = WooCommerceClient::from_credentials(&config.credentials)?;
    let store = sheets_client(config)?;
    match sync_orders(&config.sync, mode, &source, &store).await {
        Ok(report) => {
            tracing::info!(command = "orders", ?report, "Order sync complete");
            print_order_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "orders", error = %e, "Order sync failed");
            Err(anyhow::Error::new(e))
        }
    }
}

async fn run_customers(config: &AppConfig) -> Result<()> {
    tracing::info!(command = "customers", "Starting customer sync");
    let store = sheets_client(config)?;
    match sync_customers(&config.sync, &store).await {
        Ok(report) => {
            tracing::info!(command = "customers", ?report, "Customer sync complete");
            print_customer_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "customers", error = %e, "Customer sync failed");
            Err(anyhow::Error::new(e))
        }
    }
}

fn print_order_report(report: &OrderSyncReport) {
    for line in order_report_lines(report) {
        println!("{line}");
    }
}

/// Human-readable summary of an order sync run. An early fetch stop is
/// always reported so an outage is not mistaken for an empty storefront.
pub fn order_report_lines(report: &OrderSyncReport) -> Vec<String> {
    let mut lines = Vec::new();
    match &report.fetch_stop {
        Some(FetchStop::Abandoned { page, error }) => lines.push(format!(
            "Warning: fetch abandoned at page {page} after {} pages; {} orders fetched before the failure: {error}",
            report.pages_fetched, report.orders_fetched
        )),
        Some(FetchStop::Cap) => lines.push(format!(
            "Order cap reached after {} pages ({} orders); run again to continue.",
            report.pages_fetched, report.orders_fetched
        )),
        Some(FetchStop::LastPage) | None => {}
    }
    match &report.outcome {
        OrderSyncOutcome::NoNewOrders => lines.push(format!(
            "No new orders to process ({} fetched, {} after filtering).",
            report.orders_fetched, report.orders_kept
        )),
        OrderSyncOutcome::Synced { watermark } => {
            lines.push(format!(
                "Done. Total rows uploaded: {} from {} orders in {} chunks.",
                report.rows_appended, report.orders_kept, report.chunks_uploaded
            ));
            lines.push(format!(
                "Last synced order {} created {}.",
                watermark.order_id, watermark.created
            ));
        }
    }
    lines
}

fn print_customer_report(report: &CustomerSyncReport) {
    if report.rows_read == 0 {
        println!("No order data found.");
        return;
    }
    println!(
        "Done. Total unique customers uploaded: {} ({} registered, {} guest) from {} order rows.",
        report.rows_written, report.registered_customers, report.guest_customers, report.rows_read
    );
}
