pub mod cli;
pub mod load_config;
pub mod sheets;
pub mod woocommerce;

pub use cli::{order_report_lines, run, Cli, Commands};
