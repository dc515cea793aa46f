//! End-to-end run scenarios against in-process fakes.
//!
//! The page source serves a fixed record set honouring `$limit`/`$offset`
//! and the `col > 'value'` filter; the sink emulates a keyed staging table
//! with ON CONFLICT overwrite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tidemark_engine::config::PipelineConfig;
use tidemark_engine::extract::{PageRequest, PageSource};
use tidemark_engine::load::StagingSink;
use tidemark_engine::{run_sync, ExtractError, LoadError, PipelineError, RunOutcome};
use tidemark_state::{FileWatermarkStore, SqliteWatermarkStore, StateError, WatermarkStore};
use tidemark_types::{Batch, PipelineId, RawRecord, Watermark};

const TS: &str = "response_timestamp";
const KEY: &str = "incident_number";

struct FakeSource {
    records: Vec<RawRecord>,
    honour_filter: bool,
    requests: Mutex<Vec<PageRequest>>,
}

impl FakeSource {
    fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            honour_filter: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<RawRecord>, ExtractError> {
        self.requests.lock().unwrap().push(request.clone());
        let threshold = request
            .filter
            .as_deref()
            .filter(|_| self.honour_filter)
            .and_then(|f| f.split('\'').nth(1))
            .map(ToString::to_string);

        Ok(self
            .records
            .iter()
            .filter(|r| match &threshold {
                Some(t) => r[TS].as_str().is_some_and(|v| v > t.as_str()),
                None => true,
            })
            .skip(usize::try_from(request.offset).unwrap())
            .take(usize::try_from(request.limit).unwrap())
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct FakeSink {
    table: BTreeMap<String, BTreeMap<String, Option<String>>>,
    ensured: Vec<Vec<String>>,
    upserts: usize,
    fail_upsert: bool,
    closed: bool,
}

#[async_trait]
impl StagingSink for FakeSink {
    async fn ensure_table(&mut self, columns: &[String]) -> Result<(), LoadError> {
        self.ensured.push(columns.to_vec());
        Ok(())
    }

    async fn upsert(&mut self, batch: &Batch) -> Result<u64, LoadError> {
        self.upserts += 1;
        if self.fail_upsert {
            return Err(LoadError::Closed);
        }
        let key_idx = batch.column_index(KEY).unwrap();
        for row in batch.rows() {
            let key = row[key_idx].as_text().unwrap().into_owned();
            let values = batch
                .columns()
                .iter()
                .zip(row)
                .map(|(c, cell)| (c.clone(), cell.as_text().map(|s| s.into_owned())))
                .collect();
            self.table.insert(key, values);
        }
        Ok(batch.num_rows() as u64)
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

struct ReadOnlyStore(SqliteWatermarkStore);

impl WatermarkStore for ReadOnlyStore {
    fn read(&self, pipeline: &PipelineId) -> tidemark_state::error::Result<Option<Watermark>> {
        self.0.read(pipeline)
    }

    fn write(&self, _: &PipelineId, _: &Watermark) -> tidemark_state::error::Result<()> {
        Err(StateError::LockPoisoned)
    }
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.source.endpoint = "https://data.example.org/resource/{dataset_id}.json".into();
    config
}

fn pid() -> PipelineId {
    PipelineId::new(config().pipeline)
}

fn incident(n: usize, ts: &str, address: &str) -> RawRecord {
    let mut r = RawRecord::new();
    r.insert(KEY.into(), json!(n.to_string()));
    r.insert(TS.into(), json!(ts));
    r.insert("Address".into(), json!(address));
    r.insert("Suppression Units".into(), json!(n % 5));
    r
}

/// `n` incidents one second apart starting at 2024-01-01T00:00:00.
fn incidents(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::seconds(i64::try_from(i).unwrap());
            incident(i, &ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(), "Main St")
        })
        .collect()
}

fn store() -> SqliteWatermarkStore {
    SqliteWatermarkStore::in_memory().unwrap()
}

#[tokio::test]
async fn full_load_pages_until_short_page() {
    let source = FakeSource::new(incidents(4450));
    let store = store();
    let mut sink = FakeSink::default();

    let report = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Loaded);
    assert_eq!(report.records_fetched, 4450);
    assert_eq!(report.pages_fetched, 3);
    assert!(!report.truncated);
    assert_eq!(report.records_loaded, 4450);
    assert_eq!(sink.table.len(), 4450);
    assert!(sink.closed);

    // 4449 seconds after midnight.
    let expected = Watermark::new("2024-01-01T01:14:09.000");
    assert_eq!(report.watermark_after.as_ref(), Some(&expected));
    assert_eq!(store.read(&pid()).unwrap(), Some(expected));
}

#[tokio::test]
async fn file_store_carries_watermark_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("last_run.txt");
    let mut sink = FakeSink::default();

    let first = FakeSource::new(incidents(30));
    let store = FileWatermarkStore::new(&path);
    run_sync(&config(), &first, &store, &mut sink).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap().trim(),
        "2024-01-01T00:00:29.000"
    );

    let second = FakeSource::new(incidents(40));
    let reopened = FileWatermarkStore::new(&path);
    let report = run_sync(&config(), &second, &reopened, &mut sink).await.unwrap();

    assert_eq!(report.records_fetched, 10);
    assert_eq!(sink.table.len(), 40);
    assert_eq!(
        reopened.read(&pid()).unwrap().unwrap().as_str(),
        "2024-01-01T00:00:39.000"
    );
}

#[tokio::test]
async fn columns_are_canonicalised_before_load() {
    let source = FakeSource::new(incidents(3));
    let store = store();
    let mut sink = FakeSink::default();

    run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(
        sink.ensured,
        vec![vec![
            "address".to_string(),
            "suppression_units".to_string(),
            KEY.to_string(),
            TS.to_string(),
        ]]
    );
    assert_eq!(sink.table["2"]["suppression_units"].as_deref(), Some("2"));
}

#[tokio::test]
async fn empty_page_with_watermark_is_no_new_data() {
    let source = FakeSource::new(incidents(10));
    let store = store();
    store.write(&pid(), &Watermark::new("2024-06-01T00:00:00.000")).unwrap();
    let mut sink = FakeSink::default();

    let report = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::NoNewData);
    assert_eq!(report.records_fetched, 0);
    assert_eq!(source.request_count(), 1);
    assert_eq!(sink.upserts, 0);
    assert!(sink.ensured.is_empty());
    assert!(sink.closed);
    assert!(!report.watermark_advanced());
    assert_eq!(
        store.read(&pid()).unwrap().unwrap().as_str(),
        "2024-06-01T00:00:00.000"
    );
}

#[tokio::test]
async fn incremental_run_only_fetches_newer_rows() {
    let source = FakeSource::new(incidents(100));
    let store = store();
    store
        .write(&pid(), &Watermark::new("2024-01-01T00:00:49.000"))
        .unwrap();
    let mut sink = FakeSink::default();

    let report = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(report.records_fetched, 50);
    assert_eq!(
        source.requests.lock().unwrap()[0].filter.as_deref(),
        Some("response_timestamp > '2024-01-01T00:00:49.000'")
    );
    assert_eq!(
        store.read(&pid()).unwrap().unwrap().as_str(),
        "2024-01-01T00:01:39.000"
    );
}

#[tokio::test]
async fn duplicate_key_keeps_latest_version() {
    let source = FakeSource::new(vec![
        incident(123, "2024-01-02T00:00:00.000", "newer"),
        incident(7, "2024-01-01T06:00:00.000", "other"),
        incident(123, "2024-01-01T00:00:00.000", "older"),
    ]);
    let store = store();
    let mut sink = FakeSink::default();

    let report = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Loaded);
    assert_eq!(report.duplicates_removed, 1);
    assert!(report.verdict.tags().contains(&"WARN_KEY_UNIQUENESS".to_string()));
    assert_eq!(sink.table.len(), 2);
    assert_eq!(sink.table["123"]["address"].as_deref(), Some("newer"));
}

#[tokio::test]
async fn missing_key_value_halts_without_loading() {
    let mut records = incidents(3);
    records[1].insert(KEY.into(), serde_json::Value::Null);
    let source = FakeSource::new(records);
    let store = store();
    let mut sink = FakeSink::default();

    let report = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(report.missing_keys, 1);
    assert!(report.verdict.should_halt());
    assert!(report
        .verdict
        .tags()
        .contains(&"FAIL_KEY_COMPLETENESS".to_string()));
    assert_eq!(sink.upserts, 0);
    assert!(sink.ensured.is_empty());
    assert!(sink.closed);
    assert!(store.read(&pid()).unwrap().is_none());
}

#[tokio::test]
async fn missing_key_column_fails_the_run() {
    let mut records = incidents(2);
    for r in &mut records {
        r.remove(KEY);
    }
    let source = FakeSource::new(records);
    let store = store();
    let mut sink = FakeSink::default();

    let err = run_sync(&config(), &source, &store, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::MissingKeyColumn(ref c) if c == KEY));
    assert_eq!(sink.upserts, 0);
    assert!(sink.closed);
    assert!(store.read(&pid()).unwrap().is_none());
}

#[tokio::test]
async fn reloading_same_batch_converges() {
    let mut source = FakeSource::new(incidents(25));
    source.honour_filter = false;
    let store = store();
    let mut sink = FakeSink::default();

    let first = run_sync(&config(), &source, &store, &mut sink).await.unwrap();
    let after_first = sink.table.clone();
    let second = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(sink.table, after_first);
    assert_eq!(sink.upserts, 2);
    assert!(first.watermark_advanced());
    assert!(!second.watermark_advanced());
    assert_eq!(second.watermark_before, first.watermark_after);
}

#[tokio::test]
async fn invalid_watermark_never_fetches_or_advances() {
    let source = FakeSource::new(incidents(5));
    let store = store();
    store.write(&pid(), &Watermark::new("garbage")).unwrap();
    let mut sink = FakeSink::default();

    let err = run_sync(&config(), &source, &store, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Extract(ExtractError::InvalidWatermark(_))
    ));
    assert_eq!(source.request_count(), 0);
    assert_eq!(sink.upserts, 0);
    assert!(sink.closed);
    assert_eq!(store.read(&pid()).unwrap().unwrap().as_str(), "garbage");
}

#[tokio::test]
async fn watermark_write_failure_is_not_fatal() {
    let source = FakeSource::new(incidents(5));
    let store = ReadOnlyStore(store());
    let mut sink = FakeSink::default();

    let report = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Loaded);
    assert_eq!(sink.table.len(), 5);
    assert!(!report.watermark_advanced());
}

#[tokio::test]
async fn load_failure_does_not_advance() {
    let source = FakeSource::new(incidents(5));
    let store = store();
    let mut sink = FakeSink {
        fail_upsert: true,
        ..FakeSink::default()
    };

    let err = run_sync(&config(), &source, &store, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Load(LoadError::Closed)));
    assert!(sink.closed);
    assert!(store.read(&pid()).unwrap().is_none());
}

#[tokio::test]
async fn page_cap_truncates_and_advances_to_partial_max() {
    let source = FakeSource::new(incidents(4450));
    let store = store();
    let mut sink = FakeSink::default();
    let mut config = config();
    config.source.max_pages = 2;

    let report = run_sync(&config, &source, &store, &mut sink).await.unwrap();

    assert!(report.truncated);
    assert_eq!(report.records_fetched, 4000);
    assert_eq!(report.pages_fetched, 2);
    // 3999 seconds after midnight.
    assert_eq!(
        store.read(&pid()).unwrap().unwrap().as_str(),
        "2024-01-01T01:06:39.000"
    );
}

#[tokio::test]
async fn batch_without_timestamps_loads_but_keeps_watermark() {
    let mut records = incidents(3);
    for r in &mut records {
        r.insert(TS.into(), serde_json::Value::Null);
    }
    let source = FakeSource::new(records);
    let store = store();
    let mut sink = FakeSink::default();

    let report = run_sync(&config(), &source, &store, &mut sink).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Loaded);
    assert_eq!(sink.table.len(), 3);
    assert!(store.read(&pid()).unwrap().is_none());
}
