/// `load_config` module: builds the runtime configuration from the environment
/// and an optional static YAML file.
///
/// # Responsibilities
/// - Read secrets (API key pair, sheet access token) from the environment only.
/// - Read the tunables named in the environment (`STORE_TIMEZONE`,
///   `ORDERS_PER_PAGE`, `MAX_ORDERS`), falling back to YAML and then to defaults.
/// - Parse the optional YAML file for sheet layout and upload tuning.
/// - Map loosely-typed values (timezone names, counting mode) to core types.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Context, Result};
use order_sync_core::aggregate::OrderCounting;
use order_sync_core::config::{SheetLayout, SyncConfig};
use order_sync_core::timefmt;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

/// Connection details for the storefront and the spreadsheet.
#[derive(Clone)]
pub struct Credentials {
    pub store_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub sheet_id: String,
    pub sheets_access_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("store_url", &self.store_url)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("sheet_id", &self.sheet_id)
            .field("sheets_access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub sync: SyncConfig,
}

/// Static, secret-free settings file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub store_url: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub orders_per_page: Option<u32>,
    #[serde(default)]
    pub max_orders: Option<usize>,
    #[serde(default)]
    pub sheets: Option<SheetsSection>,
    #[serde(default)]
    pub upload: Option<UploadSection>,
    /// `line_items` (default) or `distinct_orders`.
    #[serde(default)]
    pub order_counting: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetsSection {
    pub orders: Option<String>,
    pub customers: Option<String>,
    pub logs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadSection {
    pub order_chunk_size: Option<usize>,
    pub customer_chunk_size: Option<usize>,
    pub max_attempts: Option<u32>,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(key: &str) -> Result<String> {
    env_var(key).ok_or_else(|| {
        error!(key, "Required environment variable missing");
        anyhow!("missing required environment variable {key}")
    })
}

fn parsed_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("invalid value {raw:?} for {key}: {e}"))
        })
        .transpose()
}

fn parse_counting(raw: &str) -> Result<OrderCounting> {
    match raw.trim() {
        "line_items" | "LineItems" => Ok(OrderCounting::LineItems),
        "distinct_orders" | "DistinctOrders" => Ok(OrderCounting::DistinctOrders),
        other => Err(anyhow!("unknown order_counting {other:?}; expected line_items or distinct_orders")),
    }
}

/// Parse a YAML settings file.
pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");
    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;
    // An empty file is a valid, empty configuration.
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })
}

/// Build the full configuration. Environment values win over the file.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let file = match path {
        Some(p) => load_file_config(p)?,
        None => FileConfig::default(),
    };

    let store_url = env_var("STORE_URL")
        .or(file.store_url)
        .ok_or_else(|| anyhow!("missing required environment variable STORE_URL"))?;
    let credentials = Credentials {
        store_url: store_url.trim_end_matches('/').to_string(),
        consumer_key: required_env("CONSUMER_KEY")?,
        consumer_secret: required_env("CONSUMER_SECRET")?,
        sheet_id: required_env("SHEET_ID")?,
        sheets_access_token: required_env("SHEETS_ACCESS_TOKEN")?,
    };

    let mut sync = SyncConfig::default();

    let tz_name = env_var("STORE_TIMEZONE")
        .or(file.timezone)
        .unwrap_or_else(|| "UTC".to_string());
    sync.timezone = timefmt::parse_timezone(&tz_name).context("STORE_TIMEZONE")?;

    if let Some(page_size) = parsed_env::<u32>("ORDERS_PER_PAGE")?.or(file.orders_per_page) {
        if page_size == 0 {
            return Err(anyhow!("ORDERS_PER_PAGE must be positive"));
        }
        sync.fetch.page_size = page_size;
    }
    if let Some(max_orders) = parsed_env::<usize>("MAX_ORDERS")?.or(file.max_orders) {
        sync.fetch.max_orders = max_orders;
    }

    if let Some(sheets) = file.sheets {
        let defaults = SheetLayout::default();
        sync.sheets = SheetLayout {
            orders: sheets.orders.unwrap_or(defaults.orders),
            customers: sheets.customers.unwrap_or(defaults.customers),
            logs: sheets.logs.unwrap_or(defaults.logs),
        };
    }
    if let Some(upload) = file.upload {
        if let Some(size) = upload.order_chunk_size {
            sync.order_upload.chunk_size = size.max(1);
        }
        if let Some(size) = upload.customer_chunk_size {
            sync.customer_upload.chunk_size = size.max(1);
        }
        if let Some(attempts) = upload.max_attempts {
            sync.order_upload.max_attempts = attempts.max(1);
            sync.customer_upload.max_attempts = attempts.max(1);
        }
    }
    if let Some(raw) = file.order_counting.as_deref() {
        sync.counting = parse_counting(raw)?;
    }

    info!(store_url = %credentials.store_url, sheet_id = %credentials.sheet_id, "Configuration assembled");
    sync.trace_loaded();
    Ok(AppConfig { credentials, sync })
}
