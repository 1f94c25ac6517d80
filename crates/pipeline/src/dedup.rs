//! Structural task deduplication.
//!
//! Extracted tasks are compared against everything already accepted, not
//! just their left neighbor, so duplicates separated by unrelated tasks
//! still collapse. The fingerprint is advisory; content equality decides.

use std::collections::HashMap;
use tracing::info;
use tuneforge_ir::{structural_eq, structural_hash, ProgramModule};

use crate::extract::ExtractedTask;

/// Outcome of one deduplication pass, first-seen order preserved.
pub struct DedupReport {
    pub tasks: Vec<ExtractedTask>,
    pub before: usize,
    pub after: usize,
}

pub fn dedup_tasks(tasks: Vec<ExtractedTask>) -> DedupReport {
    dedup_tasks_with(tasks, structural_hash)
}

/// Same pass with an injectable fingerprint, so collision behavior is
/// testable with a degenerate hash.
pub fn dedup_tasks_with(
    tasks: Vec<ExtractedTask>,
    hash: impl Fn(&ProgramModule) -> u64,
) -> DedupReport {
    let before = tasks.len();
    let mut accepted: Vec<ExtractedTask> = Vec::with_capacity(before);
    // fingerprint -> indices into `accepted`
    let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();

    'next: for task in tasks {
        let fingerprint = task
            .dispatched
            .first()
            .map(&hash)
            .unwrap_or_default();
        if let Some(bucket) = buckets.get(&fingerprint) {
            for &idx in bucket {
                if modules_eq(&accepted[idx], &task) {
                    continue 'next;
                }
            }
        }
        buckets.entry(fingerprint).or_default().push(accepted.len());
        accepted.push(task);
    }

    let after = accepted.len();
    info!(before, after, "deduplicated tuning tasks");
    DedupReport {
        tasks: accepted,
        before,
        after,
    }
}

fn modules_eq(a: &ExtractedTask, b: &ExtractedTask) -> bool {
    a.dispatched.len() == b.dispatched.len()
        && a.dispatched
            .iter()
            .zip(&b.dispatched)
            .all(|(x, y)| structural_eq(x, y))
}
