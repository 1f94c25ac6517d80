//! Trace mutators and the per-target mutation-probability table.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tuneforge_ir::{Trace, TraceStep};

/// Produces a mutated variant of a trace, or `None` when the trace has
/// nothing this mutator can act on.
pub trait Mutator: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn mutate(&self, trace: &Trace, seed: u64) -> Option<Trace>;
}

/// Weighted mutator table; weights need not sum to one — the remainder is
/// the probability of leaving a candidate unmutated.
pub type MutatorProbs = Vec<(Arc<dyn Mutator>, f64)>;

/// Sample a mutator from the table, or `None` for "no mutation".
pub fn pick_mutator(probs: &MutatorProbs, seed: u64) -> Option<Arc<dyn Mutator>> {
    if probs.is_empty() {
        return None;
    }
    let mut rng = fastrand::Rng::with_seed(seed);
    let roll = rng.f64();
    let mut acc = 0.0;
    for (mutator, prob) in probs {
        acc += prob;
        if roll < acc {
            return Some(Arc::clone(mutator));
        }
    }
    None
}

/// Mix a string into a seed; used to derive per-op and per-trial seeds.
pub fn hash_seed(seed: u64, salt: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    salt.hash(&mut hasher);
    hasher.finish()
}

/// Bump an unroll factor to a neighboring value.
#[derive(Debug)]
pub struct MutateUnroll;

impl MutateUnroll {
    const FACTORS: [usize; 5] = [2, 4, 8, 16, 32];
}

impl Mutator for MutateUnroll {
    fn name(&self) -> &'static str {
        "mutate-unroll"
    }

    fn mutate(&self, trace: &Trace, seed: u64) -> Option<Trace> {
        let unroll_positions: Vec<usize> = trace
            .steps()
            .iter()
            .enumerate()
            .filter(|(_, step)| matches!(step, TraceStep::Unroll { .. }))
            .map(|(i, _)| i)
            .collect();
        if unroll_positions.is_empty() {
            return None;
        }
        let mut rng = fastrand::Rng::with_seed(seed);
        let pos = unroll_positions[rng.usize(..unroll_positions.len())];
        let mut steps = trace.steps().to_vec();
        if let TraceStep::Unroll { factor, .. } = &mut steps[pos] {
            let replacement = Self::FACTORS[rng.usize(..Self::FACTORS.len())];
            if replacement == *factor {
                return None;
            }
            *factor = replacement;
        }
        Some(Trace::from_steps(steps))
    }
}

/// Drop a compute-at decision, letting the op stay at its root location.
#[derive(Debug)]
pub struct MutateComputeLocation;

impl Mutator for MutateComputeLocation {
    fn name(&self) -> &'static str {
        "mutate-compute-location"
    }

    fn mutate(&self, trace: &Trace, seed: u64) -> Option<Trace> {
        let compute_positions: Vec<usize> = trace
            .steps()
            .iter()
            .enumerate()
            .filter(|(_, step)| matches!(step, TraceStep::ComputeAt { .. }))
            .map(|(i, _)| i)
            .collect();
        if compute_positions.is_empty() {
            return None;
        }
        let mut rng = fastrand::Rng::with_seed(seed);
        let pos = compute_positions[rng.usize(..compute_positions.len())];
        let mut steps = trace.steps().to_vec();
        steps.remove(pos);
        Some(Trace::from_steps(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unrolled_trace() -> Trace {
        Trace::from_steps(vec![TraceStep::Unroll {
            op: "mm".into(),
            factor: 4,
        }])
    }

    #[test]
    fn test_mutate_unroll_changes_factor() {
        let trace = unrolled_trace();
        let mut changed = false;
        for seed in 0..16 {
            if let Some(mutated) = MutateUnroll.mutate(&trace, seed) {
                assert_ne!(mutated, trace);
                changed = true;
            }
        }
        assert!(changed);
    }

    #[test]
    fn test_mutate_unroll_needs_unroll_step() {
        let trace = Trace::from_steps(vec![TraceStep::Parallel { op: "mm".into() }]);
        assert!(MutateUnroll.mutate(&trace, 0).is_none());
    }

    #[test]
    fn test_compute_location_removes_step() {
        let trace = Trace::from_steps(vec![TraceStep::ComputeAt {
            op: "act".into(),
            consumer: "mm".into(),
        }]);
        let mutated = MutateComputeLocation.mutate(&trace, 1).unwrap();
        assert!(mutated.is_empty());
    }

    #[test]
    fn test_pick_mutator_respects_empty_table() {
        assert!(pick_mutator(&Vec::new(), 3).is_none());
    }
}
