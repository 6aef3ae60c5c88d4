//! Backfill Job persistence and the system-wide admission singleton
//! (spec §4.1, §5 "Backfill admission").

use crate::codec::{decode, encode, get_typed, put_typed, scan_all};
use crate::error::{StoreError, StoreResult};
use crate::store::{trees, Store};
use coordinator_types::{BackfillJob, BackfillStatus};

const ADMISSION_KEY: &str = "backfill:running_job_id";

#[derive(Clone)]
pub struct BackfillStore {
    store: Store,
}

impl BackfillStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Admission control: succeeds only if no job is currently `Running`.
    /// Implemented as a `compare_and_swap` on a singleton key, equivalent to
    /// the `UNIQUE (status) WHERE status = 'running'` partial index named in
    /// the spec.
    pub fn try_admit(&self, job: &BackfillJob) -> StoreResult<()> {
        let locks = self.store.tree(trees::LOCKS)?;
        let new_value = encode(&job.id)?;
        let cas = locks.compare_and_swap(ADMISSION_KEY, None::<&[u8]>, Some(new_value))?;
        if cas.is_err() {
            return Err(StoreError::Conflict(
                "a backfill job is already running".to_string(),
            ));
        }
        self.put_job(job)
    }

    /// Release the admission slot. No-op if `job_id` doesn't hold it (e.g.
    /// a stale caller after a requeue), so callers don't need to check first.
    pub fn release(&self, job_id: &str) -> StoreResult<()> {
        let locks = self.store.tree(trees::LOCKS)?;
        if let Some(current) = locks.get(ADMISSION_KEY)? {
            let current_id: String = decode(&current)?;
            if current_id == job_id {
                locks.remove(ADMISSION_KEY)?;
            }
        }
        Ok(())
    }

    pub fn running_job_id(&self) -> StoreResult<Option<String>> {
        let locks = self.store.tree(trees::LOCKS)?;
        match locks.get(ADMISSION_KEY)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_job(&self, job: &BackfillJob) -> StoreResult<()> {
        let tree = self.store.tree(trees::BACKFILL_JOBS)?;
        put_typed(&tree, &job.id, job)
    }

    pub fn get_job(&self, id: &str) -> StoreResult<Option<BackfillJob>> {
        let tree = self.store.tree(trees::BACKFILL_JOBS)?;
        get_typed(&tree, id)
    }

    pub fn list_jobs(&self) -> StoreResult<Vec<BackfillJob>> {
        let tree = self.store.tree(trees::BACKFILL_JOBS)?;
        scan_all(&tree)
    }

    /// Update progress (cursor, counters) and, if the job finished, release
    /// the admission slot in the same call so callers can't forget to.
    pub fn advance(&self, job: &BackfillJob) -> StoreResult<()> {
        self.put_job(job)?;
        if job.is_done() {
            self.release(&job.id)?;
        }
        Ok(())
    }

    /// Permanent failure path: mark the job failed and release admission,
    /// without mutating the live feed tape (spec §4.1 "Failure semantics").
    pub fn fail(&self, job: &mut BackfillJob, error: impl Into<String>) -> StoreResult<()> {
        job.status = BackfillStatus::Failed;
        job.error = Some(error.into());
        self.advance(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> BackfillJob {
        let mut j = BackfillJob::new(id, "pyth/BTC-USD/price/1m", 0, 1000);
        j.status = BackfillStatus::Running;
        j
    }

    #[test]
    fn only_one_job_admitted_at_a_time() {
        let store = Store::open_temporary().unwrap();
        let backfill = BackfillStore::new(store);

        backfill.try_admit(&job("job-1")).unwrap();
        let err = backfill.try_admit(&job("job-2")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn completing_a_job_frees_the_slot() {
        let store = Store::open_temporary().unwrap();
        let backfill = BackfillStore::new(store);

        let mut j1 = job("job-1");
        backfill.try_admit(&j1).unwrap();
        j1.status = BackfillStatus::Completed;
        backfill.advance(&j1).unwrap();

        backfill.try_admit(&job("job-2")).unwrap();
    }
}
