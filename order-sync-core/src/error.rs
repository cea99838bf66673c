//! Error taxonomy for the sync engine.
//!
//! Transport failures from either collaborator are retried by the caller
//! ([`crate::fetch`], [`crate::sink`]); data errors such as a missing or
//! unparseable watermark abort a run before anything is written.

use thiserror::Error;

/// Failure talking to the order source (storefront REST API).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Failure talking to the tabular store (spreadsheet API).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),
}

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("no sync watermark found; run a full rebuild to bootstrap the order table")]
    Missing,
    #[error("last logged 'Date Created' is missing or invalid: {0:?}")]
    InvalidCreated(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A chunk of rows could not be appended after exhausting its retries.
#[derive(Debug, Error)]
#[error(
    "failed to append rows {first_row}-{last_row} to {range} after {attempts} attempts \
     ({rows_appended} rows appended before the failure): {source}"
)]
pub struct ChunkUploadError {
    pub range: String,
    pub first_row: usize,
    pub last_row: usize,
    pub attempts: u32,
    pub rows_appended: usize,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("order table is missing required column {0:?}")]
    MissingColumn(&'static str),
}

/// Orchestrator-level failure of an order or customer sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Watermark(#[from] WatermarkError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Upload(#[from] ChunkUploadError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}
