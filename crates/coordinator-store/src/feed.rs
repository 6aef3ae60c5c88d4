//! Feed Store: append-only records plus per-scope ingestion watermarks.
//!
//! `upsert_records` is the one place the monotonicity invariant (spec §4.1,
//! §8 invariant 2) is enforced: records at or below the current watermark
//! are silently dropped, and the watermark only ever advances to the
//! maximum `ts_event` actually inserted — all inside one `sled` transaction
//! spanning both trees, so a crash mid-upsert never leaves the watermark
//! ahead of what was actually persisted.

use crate::codec::{decode, encode};
use crate::error::{StoreError, StoreResult};
use crate::store::{trees, Store};
use coordinator_types::FeedRecord;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};

#[derive(Clone)]
pub struct FeedStore {
    store: Store,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertOutcome {
    pub inserted: u64,
    pub duplicates: u64,
    pub new_watermark: Option<i64>,
}

impl FeedStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn watermark(&self, scope_key: &str) -> StoreResult<Option<i64>> {
        let tree = self.store.tree(trees::FEED_WATERMARKS)?;
        match tree.get(scope_key.as_bytes())? {
            Some(bytes) => Ok(Some(decode::<i64>(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Upsert a batch of records for a single ingestion scope. `scope_key`
    /// must match every record's `scope_key()`; the caller (the Feed
    /// Worker's poll loop) only ever fetches one scope per call, so this is
    /// asserted rather than branched on per record.
    pub fn upsert_records(&self, scope_key: &str, records: Vec<FeedRecord>) -> StoreResult<UpsertOutcome> {
        let records_tree = self.store.tree(trees::FEED_RECORDS)?;
        let watermark_tree = self.store.tree(trees::FEED_WATERMARKS)?;

        let result: Result<UpsertOutcome, TransactionError<StoreError>> =
            (&records_tree, &watermark_tree).transaction(|(rt, wt)| {
                let current_watermark: Option<i64> = match wt.get(scope_key.as_bytes())? {
                    Some(bytes) => Some(
                        decode(&bytes)
                            .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?,
                    ),
                    None => None,
                };

                let mut inserted = 0u64;
                let mut duplicates = 0u64;
                let mut max_ts = current_watermark;

                for record in &records {
                    if let Some(w) = current_watermark {
                        if record.ts_event <= w {
                            // Watermark invariant: never insert at or below W; replay is a no-op.
                            continue;
                        }
                    }
                    let key = record.unique_key();
                    if rt.get(key.as_bytes())?.is_some() {
                        duplicates += 1;
                        continue;
                    }
                    let bytes = encode(record)
                        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                    rt.insert(key.as_bytes(), bytes)?;
                    inserted += 1;
                    max_ts = Some(max_ts.map_or(record.ts_event, |m| m.max(record.ts_event)));
                }

                if max_ts != current_watermark {
                    if let Some(w) = max_ts {
                        let bytes = encode(&w)
                            .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                        wt.insert(scope_key.as_bytes(), bytes)?;
                    }
                }

                Ok(UpsertOutcome {
                    inserted,
                    duplicates,
                    new_watermark: max_ts,
                })
            });

        match result {
            Ok(outcome) => Ok(outcome),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::from(e)),
        }
    }

    /// Records for `subject` within `[start_ts, end_ts]`, scanning by the
    /// scope's key prefix (records are keyed `source/subject/kind/granularity/ts_event`).
    pub fn records_in_window(
        &self,
        scope_key: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> StoreResult<Vec<FeedRecord>> {
        let tree = self.store.tree(trees::FEED_RECORDS)?;
        let prefix = format!("{scope_key}/");
        let mut out = Vec::new();
        for entry in tree.scan_prefix(prefix.as_bytes()) {
            let (_k, v) = entry?;
            let record: FeedRecord = decode(&v)?;
            if record.ts_event >= start_ts && record.ts_event <= end_ts {
                out.push(record);
            }
        }
        out.sort_by_key(|r| r.ts_event);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_types::FeedPayload;
    use serde_json::json;

    fn record(ts: i64) -> FeedRecord {
        FeedRecord {
            source: "pyth".into(),
            subject: "BTC-USD".into(),
            kind: "price".into(),
            granularity: "1m".into(),
            ts_event: ts,
            payload: FeedPayload::Tick { price: 100.0 },
            meta: json!({}),
        }
    }

    fn scope_key() -> String {
        record(0).scope_key()
    }

    #[test]
    fn watermark_advances_to_max_and_replay_is_a_noop() {
        let store = Store::open_temporary().unwrap();
        let feed = FeedStore::new(store);
        let scope = scope_key();

        let outcome = feed.upsert_records(&scope, vec![record(10), record(20)]).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(feed.watermark(&scope).unwrap(), Some(20));

        // Replay: same records again, plus one already-below-watermark record.
        let outcome2 = feed.upsert_records(&scope, vec![record(10), record(20), record(5)]).unwrap();
        assert_eq!(outcome2.inserted, 0);
        assert_eq!(feed.watermark(&scope).unwrap(), Some(20));
    }

    #[test]
    fn watermark_never_decreases() {
        let store = Store::open_temporary().unwrap();
        let feed = FeedStore::new(store);
        let scope = scope_key();

        feed.upsert_records(&scope, vec![record(50)]).unwrap();
        feed.upsert_records(&scope, vec![record(10)]).unwrap();
        assert_eq!(feed.watermark(&scope).unwrap(), Some(50));
    }

    #[test]
    fn records_in_window_filters_and_sorts() {
        let store = Store::open_temporary().unwrap();
        let feed = FeedStore::new(store);
        let scope = scope_key();
        feed.upsert_records(&scope, vec![record(30), record(10), record(20)]).unwrap();

        let window = feed.records_in_window(&scope, 15, 25).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].ts_event, 20);
    }
}
