//! Tabular sink: chunked, retrying appends plus exact-range update and clear.

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::UploadPolicy;
use crate::contract::TabularStore;
use crate::error::{ChunkUploadError, StoreError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendReport {
    pub chunks: usize,
    pub rows: usize,
}

pub struct TabularSink<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> TabularSink<'a, S>
where
    S: TabularStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn read(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let rows = self.store.get(range).await?;
        info!(range, rows = rows.len(), "Read rows");
        Ok(rows)
    }

    pub async fn update(&self, range: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        self.store.update(range, rows).await
    }

    pub async fn clear(&self, range: &str) -> Result<(), StoreError> {
        self.store.clear(range).await?;
        info!(range, "Cleared range");
        Ok(())
    }

    /// Append `rows` in `policy.chunk_size` batches, retrying each batch.
    ///
    /// Stops at the first batch that exhausts its attempts; batches already
    /// appended stay in the store and are reported in the error.
    pub async fn append_chunked(
        &self,
        range: &str,
        rows: &[Vec<String>],
        policy: &UploadPolicy,
    ) -> Result<AppendReport, ChunkUploadError> {
        let mut report = AppendReport::default();
        for (index, chunk) in rows.chunks(policy.chunk_size.max(1)).enumerate() {
            let first_row = report.rows + 1;
            let last_row = report.rows + chunk.len();
            let mut attempt = 0;
            loop {
                attempt += 1;
                match self.store.append(range, chunk).await {
                    Ok(()) => {
                        info!(
                            batch = index + 1,
                            first_row,
                            last_row,
                            "Appended {} records",
                            chunk.len()
                        );
                        break;
                    }
                    Err(e) if attempt < policy.max_attempts => {
                        let backoff = policy.backoff_step * attempt;
                        warn!(
                            first_row,
                            last_row,
                            attempt,
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "Chunk upload failed, retrying"
                        );
                        sleep(backoff).await;
                    }
                    Err(e) => {
                        error!(first_row, last_row, attempt, error = %e, "Chunk upload failed, giving up");
                        return Err(ChunkUploadError {
                            range: range.to_string(),
                            first_row,
                            last_row,
                            attempts: attempt,
                            rows_appended: report.rows,
                            source: e,
                        });
                    }
                }
            }
            report.chunks += 1;
            report.rows += chunk.len();
            if !policy.pause_after_chunk.is_zero() {
                sleep(policy.pause_after_chunk).await;
            }
        }
        Ok(report)
    }
}
