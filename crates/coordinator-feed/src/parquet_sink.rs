//! Hive-partitioned backfill file output:
//! `{source}/{subject}/{kind}/{granularity}/YYYY-MM-DD.parquet`. Column
//! schema and merge/dedup mirror the corpus's own `write_parquet`
//! convention: build one `RecordBatch` per day, write with `ArrowWriter`,
//! re-reading and deduping by `ts_event` when a file for that day already
//! exists (a resumed backfill revisits the last partial day).

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use coordinator_types::{FeedPayload, FeedRecord};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ParquetSinkError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("arrow/parquet error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

fn partition_dir(root: &Path, scope_key: &str) -> PathBuf {
    root.join(scope_key)
}

fn day_path(root: &Path, scope_key: &str, ts_event: i64) -> PathBuf {
    let date = DateTime::<Utc>::from_timestamp(ts_event, 0).unwrap_or_default().format("%Y-%m-%d");
    partition_dir(root, scope_key).join(format!("{date}.parquet"))
}

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("source", DataType::Utf8, false),
        Field::new("subject", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("granularity", DataType::Utf8, false),
        Field::new("ts_event", DataType::Int64, false),
        Field::new("payload_kind", DataType::Utf8, false),
        Field::new("open", DataType::Float64, true),
        Field::new("high", DataType::Float64, true),
        Field::new("low", DataType::Float64, true),
        Field::new("close", DataType::Float64, true),
        Field::new("volume", DataType::Float64, true),
        Field::new("price", DataType::Float64, true),
    ]))
}

fn to_batch(records: &[FeedRecord]) -> Result<RecordBatch, ParquetSinkError> {
    let sources = StringArray::from(records.iter().map(|r| Some(r.source.as_str())).collect::<Vec<_>>());
    let subjects = StringArray::from(records.iter().map(|r| Some(r.subject.as_str())).collect::<Vec<_>>());
    let kinds = StringArray::from(records.iter().map(|r| Some(r.kind.as_str())).collect::<Vec<_>>());
    let granularities = StringArray::from(records.iter().map(|r| Some(r.granularity.as_str())).collect::<Vec<_>>());
    let ts_events = Int64Array::from(records.iter().map(|r| r.ts_event).collect::<Vec<_>>());

    let payload_kinds = StringArray::from(
        records
            .iter()
            .map(|r| match r.payload {
                FeedPayload::Bar { .. } => "bar",
                FeedPayload::Tick { .. } => "tick",
            })
            .collect::<Vec<_>>(),
    );
    let opens = Float64Array::from(records.iter().map(|r| if let FeedPayload::Bar { open, .. } = r.payload { Some(open) } else { None }).collect::<Vec<_>>());
    let highs = Float64Array::from(records.iter().map(|r| if let FeedPayload::Bar { high, .. } = r.payload { Some(high) } else { None }).collect::<Vec<_>>());
    let lows = Float64Array::from(records.iter().map(|r| if let FeedPayload::Bar { low, .. } = r.payload { Some(low) } else { None }).collect::<Vec<_>>());
    let closes = Float64Array::from(records.iter().map(|r| if let FeedPayload::Bar { close, .. } = r.payload { Some(close) } else { None }).collect::<Vec<_>>());
    let volumes = Float64Array::from(records.iter().map(|r| if let FeedPayload::Bar { volume, .. } = r.payload { Some(volume) } else { None }).collect::<Vec<_>>());
    let prices = Float64Array::from(records.iter().map(|r| if let FeedPayload::Tick { price } = r.payload { Some(price) } else { None }).collect::<Vec<_>>());

    Ok(RecordBatch::try_new(
        schema(),
        vec![
            Arc::new(sources),
            Arc::new(subjects),
            Arc::new(kinds),
            Arc::new(granularities),
            Arc::new(ts_events),
            Arc::new(payload_kinds),
            Arc::new(opens),
            Arc::new(highs),
            Arc::new(lows),
            Arc::new(closes),
            Arc::new(volumes),
            Arc::new(prices),
        ],
    )?)
}

fn from_batch(batch: &RecordBatch) -> Vec<FeedRecord> {
    let sources = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
    let subjects = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    let kinds = batch.column(2).as_any().downcast_ref::<StringArray>().unwrap();
    let granularities = batch.column(3).as_any().downcast_ref::<StringArray>().unwrap();
    let ts_events = batch.column(4).as_any().downcast_ref::<Int64Array>().unwrap();
    let payload_kinds = batch.column(5).as_any().downcast_ref::<StringArray>().unwrap();
    let opens = batch.column(6).as_any().downcast_ref::<Float64Array>().unwrap();
    let highs = batch.column(7).as_any().downcast_ref::<Float64Array>().unwrap();
    let lows = batch.column(8).as_any().downcast_ref::<Float64Array>().unwrap();
    let closes = batch.column(9).as_any().downcast_ref::<Float64Array>().unwrap();
    let volumes = batch.column(10).as_any().downcast_ref::<Float64Array>().unwrap();
    let prices = batch.column(11).as_any().downcast_ref::<Float64Array>().unwrap();

    (0..batch.num_rows())
        .map(|i| {
            let payload = if payload_kinds.value(i) == "bar" {
                FeedPayload::Bar {
                    open: opens.value(i),
                    high: highs.value(i),
                    low: lows.value(i),
                    close: closes.value(i),
                    volume: volumes.value(i),
                }
            } else {
                FeedPayload::Tick { price: prices.value(i) }
            };
            FeedRecord {
                source: sources.value(i).to_string(),
                subject: subjects.value(i).to_string(),
                kind: kinds.value(i).to_string(),
                granularity: granularities.value(i).to_string(),
                ts_event: ts_events.value(i),
                payload,
                meta: serde_json::json!({}),
            }
        })
        .collect()
}

/// Writes one page of backfilled records, merging into any existing daily
/// partition file and deduping by `ts_event`. Records spanning multiple
/// days are grouped and written to their respective files.
pub fn write_page(root: &Path, scope_key: &str, records: &[FeedRecord]) -> Result<(), ParquetSinkError> {
    let mut by_day: BTreeMap<PathBuf, Vec<FeedRecord>> = BTreeMap::new();
    for record in records {
        by_day.entry(day_path(root, scope_key, record.ts_event)).or_default().push(record.clone());
    }

    for (path, mut new_records) in by_day {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ParquetSinkError::Io { path: path.clone(), source })?;
        }

        let mut merged: BTreeMap<i64, FeedRecord> = BTreeMap::new();
        if path.exists() {
            for existing in read_day(&path)? {
                merged.insert(existing.ts_event, existing);
            }
        }
        for record in new_records.drain(..) {
            merged.insert(record.ts_event, record);
        }

        let ordered: Vec<FeedRecord> = merged.into_values().collect();
        let batch = to_batch(&ordered)?;
        let file = File::create(&path).map_err(|source| ParquetSinkError::Io { path: path.clone(), source })?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
    }

    Ok(())
}

fn read_day(path: &Path) -> Result<Vec<FeedRecord>, ParquetSinkError> {
    let file = File::open(path).map_err(|source| ParquetSinkError::Io { path: path.to_path_buf(), source })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut out = Vec::new();
    for batch in reader {
        out.extend(from_batch(&batch?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: i64, price: f64) -> FeedRecord {
        FeedRecord {
            source: "pyth".into(),
            subject: "BTC-USD".into(),
            kind: "price".into(),
            granularity: "1m".into(),
            ts_event: ts,
            payload: FeedPayload::Tick { price },
            meta: serde_json::json!({}),
        }
    }

    #[test]
    fn merging_a_second_page_dedups_by_ts_event() {
        let dir = tempfile::tempdir().unwrap();
        let scope_key = "pyth/BTC-USD/price/1m";

        write_page(dir.path(), scope_key, &[record(1_700_000_000, 100.0)]).unwrap();
        write_page(dir.path(), scope_key, &[record(1_700_000_000, 999.0), record(1_700_000_060, 101.0)]).unwrap();

        let path = day_path(dir.path(), scope_key, 1_700_000_000);
        let rows = read_day(&path).unwrap();
        assert_eq!(rows.len(), 2);
        let first = rows.iter().find(|r| r.ts_event == 1_700_000_000).unwrap();
        assert_eq!(first.payload.reference_price(), 999.0);
    }
}
