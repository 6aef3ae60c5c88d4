//! Input and Prediction persistence.
//!
//! `commit_cycle` is the one atomic write boundary for a Predict cycle
//! (spec §4.2 step 7): the Input and every Prediction for that firing land
//! in a single `sled` transaction, so no Prediction row can ever exist
//! without its parent Input (spec §8 invariant 3, §5 ordering guarantee).

use crate::codec::{decode, encode, get_typed, put_typed, scan_prefix};
use crate::error::{StoreError, StoreResult};
use crate::store::{trees, Store};
use coordinator_types::{Input, Prediction};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};

#[derive(Clone)]
pub struct PredictStore {
    store: Store,
}

impl PredictStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn commit_cycle(&self, input: &Input, predictions: &[Prediction]) -> StoreResult<()> {
        let inputs_tree = self.store.tree(trees::INPUTS)?;
        let predictions_tree = self.store.tree(trees::PREDICTIONS)?;

        let result: Result<(), TransactionError<StoreError>> =
            (&inputs_tree, &predictions_tree).transaction(|(it, pt)| {
                let input_bytes = encode(input)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                it.insert(input.id.as_bytes(), input_bytes)?;

                for prediction in predictions {
                    let key = format!("{}/{}", input.id, prediction.id);
                    let bytes = encode(prediction)
                        .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                    pt.insert(key.as_bytes(), bytes)?;
                }
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::from(e)),
        }
    }

    pub fn get_input(&self, id: &str) -> StoreResult<Option<Input>> {
        let tree = self.store.tree(trees::INPUTS)?;
        get_typed(&tree, id)
    }

    pub fn put_input(&self, input: &Input) -> StoreResult<()> {
        let tree = self.store.tree(trees::INPUTS)?;
        put_typed(&tree, &input.id, input)
    }

    /// Inputs with `status=Received` and `resolvable_at <= now` (spec §4.3
    /// Phase A). Scans the whole tree; bounded by tick volume (spec §9).
    pub fn resolvable_inputs(&self, now: i64) -> StoreResult<Vec<Input>> {
        let tree = self.store.tree(trees::INPUTS)?;
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_k, v) = entry?;
            let input: Input = decode(&v)?;
            if input.status == coordinator_types::InputStatus::Received && input.resolvable_at <= now {
                out.push(input);
            }
        }
        Ok(out)
    }

    pub fn predictions_for_input(&self, input_id: &str) -> StoreResult<Vec<Prediction>> {
        let tree = self.store.tree(trees::PREDICTIONS)?;
        scan_prefix(&tree, &format!("{input_id}/"))
    }

    pub fn put_prediction(&self, input_id: &str, prediction: &Prediction) -> StoreResult<()> {
        let tree = self.store.tree(trees::PREDICTIONS)?;
        let key = format!("{input_id}/{}", prediction.id);
        put_typed(&tree, &key, prediction)
    }

    /// All Predictions with `status=Pending` whose Input is `Resolved`
    /// (spec §4.3 Phase B). Bounded by tick volume; see Phase B comment.
    pub fn pending_predictions_for_resolved_inputs(&self) -> StoreResult<Vec<(Input, Vec<Prediction>)>> {
        let inputs_tree = self.store.tree(trees::INPUTS)?;
        let predictions_tree = self.store.tree(trees::PREDICTIONS)?;
        let mut out = Vec::new();

        for entry in inputs_tree.iter() {
            let (_k, v) = entry?;
            let input: Input = decode(&v)?;
            if input.status != coordinator_types::InputStatus::Resolved {
                continue;
            }
            let prefix = format!("{}/", input.id);
            let mut pending = Vec::new();
            for pentry in predictions_tree.scan_prefix(prefix.as_bytes()) {
                let (_pk, pv) = pentry?;
                let prediction: Prediction = decode(&pv)?;
                if prediction.status == coordinator_types::PredictionStatus::Pending {
                    pending.push(prediction);
                }
            }
            if !pending.is_empty() {
                out.push((input, pending));
            }
        }
        Ok(out)
    }
}
