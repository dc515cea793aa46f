//! Watermark candidate computation and advancement.

use serde_json::Value;
use tidemark_state::WatermarkStore;
use tidemark_types::timestamp::parse_timestamp;
use tidemark_types::{PipelineId, RawRecord, Watermark};

/// Largest parseable value of `incremental_column` across the fetched
/// records, rendered in the watermark layout.
///
/// Values that are not strings or do not parse as timestamps are skipped.
#[must_use]
pub fn max_watermark(records: &[RawRecord], incremental_column: &str) -> Option<Watermark> {
    let mut unparseable = 0usize;
    let max = records
        .iter()
        .filter_map(|record| match record.get(incremental_column) {
            Some(Value::String(raw)) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    unparseable += 1;
                }
                parsed
            }
            Some(Value::Null) | None => None,
            Some(_) => {
                unparseable += 1;
                None
            }
        })
        .max();

    if unparseable > 0 {
        tracing::warn!(
            column = incremental_column,
            unparseable,
            "Skipped unparseable incremental values when computing watermark"
        );
    }
    max.map(|ts| Watermark::from_timestamp(&ts))
}

/// Whether `candidate` should replace `previous`.
///
/// Both values are compared as parsed timestamps rather than as strings.
/// For two values in the `YYYY-MM-DDTHH:MM:SS.fff` layout the result is the
/// same as a lexicographic comparison; it differs only when `previous` was
/// stored in another accepted layout (e.g. a bare date or a six-digit
/// fraction). If either side does not parse, the plain string ordering of
/// [`Watermark::is_newer_than`] decides.
#[must_use]
pub fn should_advance(candidate: &Watermark, previous: Option<&Watermark>) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    match (candidate.parse(), previous.parse()) {
        (Ok(c), Ok(p)) => c > p,
        _ => candidate.is_newer_than(previous),
    }
}

/// Persist `candidate` if it moves the watermark forward. Returns `true`
/// when a new value was written.
///
/// Write failures are logged and swallowed: the load has already
/// committed and a stale watermark only causes a harmless re-fetch.
pub(crate) fn advance_watermark(
    store: &dyn WatermarkStore,
    pipeline: &PipelineId,
    candidate: &Watermark,
    previous: Option<&Watermark>,
) -> bool {
    if !should_advance(candidate, previous) {
        tracing::info!(
            pipeline = pipeline.as_str(),
            watermark = candidate.as_str(),
            "Watermark unchanged"
        );
        return false;
    }

    match store.write(pipeline, candidate) {
        Ok(()) => {
            tracing::info!(
                pipeline = pipeline.as_str(),
                previous = previous.map(Watermark::as_str),
                watermark = candidate.as_str(),
                "Watermark advanced"
            );
            true
        }
        Err(e) => {
            tracing::error!(
                pipeline = pipeline.as_str(),
                watermark = candidate.as_str(),
                error = %e,
                "Failed to persist watermark; next run will re-fetch loaded rows"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tidemark_state::SqliteWatermarkStore;

    const COL: &str = "response_timestamp";

    fn record(value: Value) -> RawRecord {
        let mut r = RawRecord::new();
        r.insert("incident_number".into(), json!("1"));
        r.insert(COL.into(), value);
        r
    }

    #[test]
    fn max_skips_missing_and_garbage() {
        let records = vec![
            record(json!("2024-01-02T00:00:00.000")),
            record(json!("not a date")),
            record(Value::Null),
            record(json!(17)),
            record(json!("2024-01-03T12:30:00.250")),
            record(json!("2024-01-01")),
        ];
        let wm = max_watermark(&records, COL).unwrap();
        assert_eq!(wm.as_str(), "2024-01-03T12:30:00.250");
    }

    #[test]
    fn max_without_any_timestamp_is_none() {
        let records = vec![record(Value::Null), record(json!("??"))];
        assert!(max_watermark(&records, COL).is_none());
        assert!(max_watermark(&[], COL).is_none());
    }

    #[test]
    fn advance_compares_as_timestamps() {
        let candidate = Watermark::new("2024-01-01T00:00:00.500");
        assert!(should_advance(&candidate, None));
        assert!(should_advance(&candidate, Some(&Watermark::new("2024-01-01"))));
        assert!(!should_advance(&candidate, Some(&candidate.clone())));
        assert!(!should_advance(
            &candidate,
            Some(&Watermark::new("2024-02-01T00:00:00.000"))
        ));
    }

    #[test]
    fn advance_ignores_fraction_width_and_falls_back_to_strings() {
        let candidate = Watermark::new("2024-01-01T00:00:00.500");
        // Equal instants; a string comparison would call the candidate older.
        assert!(!should_advance(
            &candidate,
            Some(&Watermark::new("2024-01-01T00:00:00.500000"))
        ));
        assert!(should_advance(
            &candidate,
            Some(&Watermark::new("2024-01-01T00:00:00.400000"))
        ));
        assert!(!should_advance(&candidate, Some(&Watermark::new("garbage"))));
    }

    #[test]
    fn advance_writes_only_newer_values() {
        let store = SqliteWatermarkStore::in_memory().unwrap();
        let pid = PipelineId::new("p");
        let first = Watermark::new("2024-01-01T00:00:00.000");
        assert!(advance_watermark(&store, &pid, &first, None));
        assert!(!advance_watermark(&store, &pid, &first, Some(&first)));
        assert_eq!(store.read(&pid).unwrap(), Some(first));
    }
}
