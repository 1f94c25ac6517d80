//! The record-store trait.

use crate::record::{TuningRecord, WorkloadId};
use anyhow::Result;
use std::sync::Arc;
use tuneforge_ir::ProgramModule;

/// Persistent store of per-task measurement history.
///
/// Implementations take `&self`; interior synchronization is theirs. The
/// orchestration core only assumes at-most-one-writer-per-workload and reads
/// sequentially at the end of a run.
pub trait Database: Send + Sync {
    /// Commit a workload, returning its id. Idempotent by structural
    /// identity: committing a structurally equal module returns the id
    /// assigned on first commit.
    fn commit_workload(&self, module: &ProgramModule) -> Result<WorkloadId>;

    /// Append a tuning record.
    fn commit_record(&self, record: TuningRecord) -> Result<()>;

    /// Best `k` records for a workload, cheapest first.
    fn get_top_k(&self, workload: WorkloadId, k: usize) -> Vec<TuningRecord>;

    /// Total number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type DynDatabase = Arc<dyn Database>;
