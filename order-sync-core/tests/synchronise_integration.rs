mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use common::{at, order, strings};
use mockall::Sequence;
use order_sync_core::aggregate::OrderCounting;
use order_sync_core::config::SyncConfig;
use order_sync_core::contract::{
    Category, MockOrderSource, MockTabularStore, OrderQuery, Product, TabularStore,
};
use order_sync_core::error::{StoreError, SyncError, WatermarkError};
use order_sync_core::flatten::ORDER_COLUMNS;
use order_sync_core::synchronise::{
    sync_customers, sync_orders, OrderSyncOutcome, SyncMode,
};

fn logged_watermark(created: &str) -> Vec<Vec<String>> {
    vec![strings(&[
        "1000",
        created,
        "",
        "7",
        "Ada Lovelace",
        "ada@example.com",
        "UTC",
    ])]
}

fn categories_source(source: &mut MockOrderSource) {
    source.expect_fetch_product().returning(|id| {
        Ok(Product {
            id,
            name: None,
            categories: vec![Category {
                name: format!("Cat {id}"),
            }],
        })
    });
}

#[tokio::test(start_paused = true)]
async fn incremental_sync_appends_new_rows_and_advances_watermark() {
    let config = SyncConfig::default();

    let mut source = MockOrderSource::new();
    source
        .expect_fetch_orders_page()
        .times(1)
        .returning(|q: &OrderQuery| {
            let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 1).unwrap();
            assert_eq!(q.after.map(|a| a.with_timezone(&Utc)), Some(expected));
            Ok(vec![
                // The storefront's `after` filter is not trusted.
                order(1, at(2024, 5, 1, 10, 0, 0), &[100]),
                order(2, at(2024, 5, 1, 10, 0, 1), &[100]),
                order(3, at(2024, 5, 1, 11, 0, 0), &[100, 200]),
                order(4, at(2024, 5, 1, 10, 30, 0), &[200]),
            ])
        });
    categories_source(&mut source);

    let appended = Arc::new(Mutex::new(Vec::new()));
    let sink = appended.clone();
    let mut store = MockTabularStore::new();
    store
        .expect_get()
        .withf(|range: &str| range == "logs!A2:G2")
        .returning(|_| Ok(logged_watermark("2024-05-01 10:00:00")));
    store
        .expect_append()
        .withf(|range: &str, _: &[Vec<String>]| range == "Orders!A2")
        .returning(move |_, rows| {
            sink.lock().unwrap().extend_from_slice(rows);
            Ok(())
        });
    store
        .expect_update()
        .withf(|range: &str, rows: &[Vec<String>]| {
            range == "logs!A2:G2" && rows[0][0] == "3" && rows[0][1] == "2024-05-01 11:00:00"
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let report = sync_orders(&config, SyncMode::Incremental, &source, &store)
        .await
        .expect("sync succeeds");

    let rows = appended.lock().unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, vec!["4", "3", "3"], "rows sorted by creation time");
    assert_eq!(rows[0][9], "Cat 200");
    assert!(rows.iter().all(|r| r.len() == ORDER_COLUMNS.len()));

    assert_eq!(report.orders_fetched, 4);
    assert_eq!(report.orders_kept, 2);
    assert_eq!(report.rows_appended, 3);
    match report.outcome {
        OrderSyncOutcome::Synced { watermark } => {
            assert_eq!(watermark.order_id, "3");
            assert!(watermark.created > Tz::UTC.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        }
        other => panic!("expected Synced, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_watermark_aborts_before_fetching() {
    let config = SyncConfig::default();
    let source = MockOrderSource::new();
    let mut store = MockTabularStore::new();
    store.expect_get().returning(|_| Ok(vec![]));

    let err = sync_orders(&config, SyncMode::Incremental, &source, &store)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Watermark(WatermarkError::Missing)));
}

#[tokio::test]
async fn invalid_watermark_aborts_before_fetching() {
    let config = SyncConfig::default();
    let source = MockOrderSource::new();
    let mut store = MockTabularStore::new();
    store
        .expect_get()
        .returning(|_| Ok(logged_watermark("")));

    let err = sync_orders(&config, SyncMode::Incremental, &source, &store)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Watermark(WatermarkError::InvalidCreated(_))
    ));
}

#[tokio::test]
async fn no_new_orders_is_a_clean_no_op() {
    let config = SyncConfig::default();
    let mut source = MockOrderSource::new();
    source.expect_fetch_orders_page().returning(|_| Ok(vec![]));
    let mut store = MockTabularStore::new();
    store
        .expect_get()
        .returning(|_| Ok(logged_watermark("2024-05-01 10:00:00")));
    store.expect_append().never();
    store.expect_update().never();

    let report = sync_orders(&config, SyncMode::Incremental, &source, &store)
        .await
        .expect("no-op is not an error");

    assert_eq!(report.outcome, OrderSyncOutcome::NoNewOrders);
    assert_eq!(report.rows_appended, 0);
}

#[tokio::test]
async fn rerun_with_unchanged_watermark_appends_nothing() {
    let config = SyncConfig::default();
    let mut source = MockOrderSource::new();
    // The upstream ignores `after` and returns the already-synced orders again.
    source.expect_fetch_orders_page().returning(|_| {
        Ok(vec![
            order(1, at(2024, 4, 30, 9, 0, 0), &[100]),
            order(2, at(2024, 5, 1, 10, 0, 0), &[100]),
        ])
    });
    source.expect_fetch_product().never();
    let mut store = MockTabularStore::new();
    store
        .expect_get()
        .returning(|_| Ok(logged_watermark("2024-05-01 10:00:00")));
    store.expect_append().never();
    store.expect_update().never();

    let report = sync_orders(&config, SyncMode::Incremental, &source, &store)
        .await
        .unwrap();

    assert_eq!(report.orders_fetched, 2);
    assert_eq!(report.orders_kept, 0);
    assert_eq!(report.outcome, OrderSyncOutcome::NoNewOrders);
}

/// Sheets keyed by name; row `n` of a sheet lives at index `n - 1`.
#[derive(Default)]
struct InMemorySheets {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
}

/// `Sheet!A2:G2` -> ("Sheet", 2, Some(2)); `Sheet!A2` and `Sheet!A2:Z` -> ("Sheet", 2, None).
fn parse_range(range: &str) -> (String, usize, Option<usize>) {
    let (sheet, cells) = range.split_once('!').unwrap_or((range, "A1"));
    let row_of = |cell: &str| {
        cell.trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse::<usize>()
            .ok()
    };
    let (start, end) = match cells.split_once(':') {
        Some((start, end)) => (row_of(start).unwrap_or(1), row_of(end)),
        None => (row_of(cells).unwrap_or(1), None),
    };
    (sheet.to_string(), start, end)
}

impl InMemorySheets {
    fn with_sheet(self, name: &str, rows: Vec<Vec<String>>) -> Self {
        self.sheets.lock().unwrap().insert(name.to_string(), rows);
        self
    }

    fn sheet(&self, name: &str) -> Vec<Vec<String>> {
        self.sheets.lock().unwrap().get(name).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TabularStore for InMemorySheets {
    async fn get(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let (sheet, start, end) = parse_range(range);
        let rows = self.sheet(&sheet);
        let end = end.unwrap_or(rows.len()).min(rows.len());
        Ok(rows.get(start - 1..end).map(<[_]>::to_vec).unwrap_or_default())
    }

    async fn append(&self, range: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let (sheet, _, _) = parse_range(range);
        let mut sheets = self.sheets.lock().unwrap();
        sheets.entry(sheet).or_default().extend_from_slice(rows);
        Ok(())
    }

    async fn update(&self, range: &str, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let (sheet, start, _) = parse_range(range);
        let mut sheets = self.sheets.lock().unwrap();
        let target = sheets.entry(sheet).or_default();
        for (offset, row) in rows.iter().enumerate() {
            let index = start - 1 + offset;
            if target.len() <= index {
                target.resize(index + 1, Vec::new());
            }
            target[index] = row.clone();
        }
        Ok(())
    }

    async fn clear(&self, range: &str) -> Result<(), StoreError> {
        let (sheet, start, _) = parse_range(range);
        let mut sheets = self.sheets.lock().unwrap();
        if let Some(rows) = sheets.get_mut(&sheet) {
            rows.truncate(start - 1);
        }
        Ok(())
    }
}

fn log_row(order_id: &str, created: &str) -> Vec<String> {
    strings(&[order_id, created, "", "7", "Ada Lovelace", "ada@example.com", "UTC"])
}

#[tokio::test(start_paused = true)]
async fn repeated_runs_against_multi_row_log_append_once() {
    let config = SyncConfig::default();
    let mut source = MockOrderSource::new();
    source
        .expect_fetch_orders_page()
        .returning(|_| Ok(vec![order(9, at(2024, 5, 2, 8, 0, 0), &[100])]));
    categories_source(&mut source);

    let store = InMemorySheets::default()
        .with_sheet("Orders", vec![ORDER_COLUMNS.iter().map(|c| c.to_string()).collect()])
        .with_sheet(
            "logs",
            vec![
                strings(&["Order ID", "Date Created"]),
                log_row("1", "2024-04-01 10:00:00"),
                log_row("2", "2024-05-01 10:00:00"),
            ],
        );

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        let report = sync_orders(&config, SyncMode::Incremental, &source, &store)
            .await
            .expect("sync succeeds");
        outcomes.push(report.rows_appended);
    }

    assert_eq!(outcomes, vec![1, 0, 0]);
    let orders = store.sheet("Orders");
    assert_eq!(orders.len(), 2, "header plus one synced row");
    assert_eq!(orders[1][0], "9");

    let logs = store.sheet("logs");
    assert_eq!(logs[1][0], "9");
    assert_eq!(logs[1][1], "2024-05-02 08:00:00");
    assert_eq!(logs[2], log_row("2", "2024-05-01 10:00:00"), "rows below the record are untouched");
}

#[tokio::test(start_paused = true)]
async fn failed_upload_does_not_advance_watermark() {
    let config = SyncConfig::default();
    let mut source = MockOrderSource::new();
    source
        .expect_fetch_orders_page()
        .returning(|_| Ok(vec![order(5, at(2024, 5, 2, 8, 0, 0), &[100])]));
    categories_source(&mut source);
    let mut store = MockTabularStore::new();
    store
        .expect_get()
        .returning(|_| Ok(logged_watermark("2024-05-01 10:00:00")));
    store
        .expect_append()
        .times(3)
        .returning(|_, _| Err(StoreError::Transport("connection refused".to_string())));
    store.expect_update().never();

    let err = sync_orders(&config, SyncMode::Incremental, &source, &store)
        .await
        .unwrap_err();

    match err {
        SyncError::Upload(e) => {
            assert_eq!(e.attempts, 3);
            assert_eq!(e.rows_appended, 0);
        }
        other => panic!("expected upload error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn full_rebuild_clears_table_and_bootstraps_watermark() {
    let config = SyncConfig::default();
    let mut source = MockOrderSource::new();
    source
        .expect_fetch_orders_page()
        .times(1)
        .returning(|q: &OrderQuery| {
            assert_eq!(q.after, None);
            Ok(vec![
                order(1, at(2024, 1, 1, 9, 0, 0), &[100]),
                order(2, at(2024, 1, 2, 9, 0, 0), &[100]),
            ])
        });
    categories_source(&mut source);

    let mut seq = Sequence::new();
    let mut store = MockTabularStore::new();
    store.expect_get().never();
    store
        .expect_clear()
        .withf(|range: &str| range == "Orders!A2:Z")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    store
        .expect_append()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    store
        .expect_update()
        .withf(|range: &str, rows: &[Vec<String>]| range == "logs!A2:G2" && rows[0][0] == "2")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let report = sync_orders(&config, SyncMode::FullRebuild, &source, &store)
        .await
        .unwrap();

    assert_eq!(report.rows_appended, 2);
    assert!(matches!(report.outcome, OrderSyncOutcome::Synced { .. }));
}

fn order_table() -> Vec<Vec<String>> {
    let header: Vec<String> = ORDER_COLUMNS.iter().map(|c| c.to_string()).collect();
    let row = |id: &str, created: &str, customer: &str, email: &str, total: &str| {
        strings(&[
            id, created, "", "completed", customer, "Someone", email, "100", "Widget", "",
            total, "1", "stripe", "Card",
        ])
    };
    vec![
        header,
        row("1", "2024-05-01 09:00:00", "7", "ada@example.com", "10"),
        row("2", "2024-05-02 09:00:00", "7", "ada@example.com", "20"),
        row("3", "2024-05-03 09:00:00", "0", "guest@example.com", "5"),
    ]
}

#[tokio::test]
async fn customer_sync_clears_then_rewrites_summary() {
    let config = SyncConfig::default();
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = written.clone();

    let mut seq = Sequence::new();
    let mut store = MockTabularStore::new();
    store
        .expect_get()
        .withf(|range: &str| range == "Orders")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(order_table()));
    store
        .expect_clear()
        .withf(|range: &str| range == "Customers!A2:Z")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    store
        .expect_append()
        .withf(|range: &str, _: &[Vec<String>]| range == "Customers!A2")
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_, rows| {
            sink.lock().unwrap().extend_from_slice(rows);
            Ok(())
        });

    let report = sync_customers(&config, &store).await.unwrap();

    assert_eq!(report.rows_read, 3);
    assert_eq!(report.registered_customers, 1);
    assert_eq!(report.guest_customers, 1);
    assert_eq!(report.rows_written, 2);
    let rows = written.lock().unwrap();
    assert_eq!(
        rows[0],
        strings(&[
            "ada@example.com",
            "7",
            "2024-05-01 09:00:00",
            "2024-05-02 09:00:00",
            "Someone",
            "2",
            "30",
            "2"
        ])
    );
    assert_eq!(rows[1][1], "0");
}

#[tokio::test]
async fn customer_sync_counts_distinct_orders_when_configured() {
    let config = SyncConfig {
        counting: OrderCounting::DistinctOrders,
        ..SyncConfig::default()
    };
    let mut table = order_table();
    table.push(table[1].clone());
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = written.clone();
    let mut store = MockTabularStore::new();
    store.expect_get().returning(move |_| Ok(table.clone()));
    store.expect_clear().returning(|_| Ok(()));
    store.expect_append().returning(move |_, rows| {
        sink.lock().unwrap().extend_from_slice(rows);
        Ok(())
    });

    sync_customers(&config, &store).await.unwrap();

    let rows = written.lock().unwrap();
    assert_eq!(rows[0][5], "2");
    assert_eq!(rows[0][6], "30");
}

#[tokio::test]
async fn customer_sync_leaves_table_alone_without_orders() {
    let config = SyncConfig::default();
    let mut store = MockTabularStore::new();
    store
        .expect_get()
        .returning(|_| Ok(vec![ORDER_COLUMNS.iter().map(|c| c.to_string()).collect()]));
    store.expect_clear().never();
    store.expect_append().never();

    let report = sync_customers(&config, &store).await.unwrap();

    assert_eq!(report.rows_read, 0);
    assert_eq!(report.rows_written, 0);
}
