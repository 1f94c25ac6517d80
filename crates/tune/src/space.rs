//! Design-space generation seams and the named default rules.
//!
//! The real search-space enumeration engine is an external collaborator;
//! these implementations fill the seam with small deterministic candidate
//! grids so the default per-target profiles resolve to working objects.

use crate::mutator::hash_seed;
use std::sync::Arc;
use tuneforge_ir::{KernelOp, PrimUnit, ProgramModule, Trace, TraceStep};

/// Proposes candidate decision sequences for one op of a unit.
pub trait ScheduleRule: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Alternative partial traces for `op`. Empty means the rule does not
    /// apply to this op.
    fn apply(&self, unit: &PrimUnit, op: &KernelOp, seed: u64) -> Vec<Trace>;
}

/// Enumerates full candidate traces for a module.
pub trait SpaceGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        module: &ProgramModule,
        rules: &[Arc<dyn ScheduleRule>],
        seed: u64,
    ) -> Vec<Trace>;
}

/// Post-order application of the schedule rules over every op, combining
/// per-op alternatives into full traces, capped to keep the grid small.
pub struct RuleBasedSpace {
    max_candidates: usize,
}

impl RuleBasedSpace {
    pub fn new() -> Self {
        Self { max_candidates: 64 }
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self
    }
}

impl Default for RuleBasedSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceGenerator for RuleBasedSpace {
    fn name(&self) -> &'static str {
        "rule-based-space"
    }

    fn generate(
        &self,
        module: &ProgramModule,
        rules: &[Arc<dyn ScheduleRule>],
        seed: u64,
    ) -> Vec<Trace> {
        let mut candidates = vec![Trace::new()];
        for (entry_name, unit) in &module.entries {
            for op in &unit.body {
                let op_seed = hash_seed(seed, entry_name) ^ hash_seed(seed, op.name());
                // The undecided variant is always an alternative.
                let mut variants = vec![Trace::new()];
                for rule in rules {
                    variants.extend(rule.apply(unit, op, op_seed));
                }
                let mut combined = Vec::with_capacity(candidates.len() * variants.len());
                for base in &candidates {
                    for variant in &variants {
                        combined.push(base.extended(variant));
                    }
                }
                if combined.len() > self.max_candidates {
                    let mut rng = fastrand::Rng::with_seed(op_seed);
                    rng.shuffle(&mut combined);
                    combined.truncate(self.max_candidates);
                }
                candidates = combined;
            }
        }
        candidates
    }
}

/// Inline injective ops into their consumers.
#[derive(Debug)]
pub struct AutoInline {
    pub into_producer: bool,
    pub into_consumer: bool,
}

impl ScheduleRule for AutoInline {
    fn name(&self) -> &'static str {
        "auto-inline"
    }

    fn apply(&self, unit: &PrimUnit, op: &KernelOp, _seed: u64) -> Vec<Trace> {
        if !self.into_consumer {
            return Vec::new();
        }
        let KernelOp::Elementwise(_) = op else {
            return Vec::new();
        };
        match unit.consumer_of(op) {
            Some(consumer) => vec![Trace::from_steps(vec![TraceStep::ComputeAt {
                op: op.name().to_string(),
                consumer: consumer.name().to_string(),
            }])],
            None => Vec::new(),
        }
    }
}

/// Tiling alternatives for matmul ops. `structure` names the loop pattern
/// (an opaque label here); `thread_binds` additionally parallelizes the
/// tiled loop nest, which is how device targets bind blocks and threads.
#[derive(Debug)]
pub struct MultiLevelTiling {
    pub structure: &'static str,
    pub thread_binds: bool,
}

impl MultiLevelTiling {
    const FACTOR_GRID: [(usize, usize, usize); 3] = [(16, 16, 16), (32, 32, 16), (64, 64, 32)];
}

impl ScheduleRule for MultiLevelTiling {
    fn name(&self) -> &'static str {
        "multi-level-tiling"
    }

    fn apply(&self, _unit: &PrimUnit, op: &KernelOp, _seed: u64) -> Vec<Trace> {
        let KernelOp::Matmul(matmul) = op else {
            return Vec::new();
        };
        let (m, k) = matmul.lhs.dims2();
        let (_, n) = matmul.rhs.dims2();
        let mut traces = Vec::new();
        for (tm, tn, tk) in Self::FACTOR_GRID {
            if tm > m || tn > n || tk > k {
                continue;
            }
            let mut steps = vec![TraceStep::Tile {
                op: op.name().to_string(),
                factors: (tm, tn, tk),
            }];
            if self.thread_binds {
                steps.push(TraceStep::Parallel {
                    op: op.name().to_string(),
                });
            }
            traces.push(Trace::from_steps(steps));
        }
        traces
    }
}

/// Parallel / vectorize / unroll alternatives for any op. Negative limits
/// disable the corresponding decision family.
#[derive(Debug)]
pub struct ParallelizeVectorizeUnroll {
    pub max_jobs_per_core: i64,
    pub max_vectorize_extent: i64,
    pub unroll_max_steps: Vec<usize>,
}

impl ScheduleRule for ParallelizeVectorizeUnroll {
    fn name(&self) -> &'static str {
        "parallelize-vectorize-unroll"
    }

    fn apply(&self, _unit: &PrimUnit, op: &KernelOp, _seed: u64) -> Vec<Trace> {
        let mut traces = Vec::new();
        if self.max_jobs_per_core > 0 {
            traces.push(Trace::from_steps(vec![TraceStep::Parallel {
                op: op.name().to_string(),
            }]));
        }
        if self.max_vectorize_extent > 0 {
            for width in [4usize, 8] {
                if (width as i64) <= self.max_vectorize_extent {
                    traces.push(Trace::from_steps(vec![TraceStep::Vectorize {
                        op: op.name().to_string(),
                        width,
                    }]));
                }
            }
        }
        for &steps in &self.unroll_max_steps {
            if steps > 0 {
                traces.push(Trace::from_steps(vec![TraceStep::Unroll {
                    op: op.name().to_string(),
                    factor: steps,
                }]));
            }
        }
        traces
    }
}

/// Parallelize reductions across a thread extent.
#[derive(Debug)]
pub struct CrossThreadReduction {
    pub thread_extents: Vec<usize>,
}

impl ScheduleRule for CrossThreadReduction {
    fn name(&self) -> &'static str {
        "cross-thread-reduction"
    }

    fn apply(&self, _unit: &PrimUnit, op: &KernelOp, _seed: u64) -> Vec<Trace> {
        let KernelOp::Reduce(_) = op else {
            return Vec::new();
        };
        self.thread_extents
            .iter()
            .map(|&extent| {
                Trace::from_steps(vec![
                    TraceStep::Parallel {
                        op: op.name().to_string(),
                    },
                    TraceStep::Unroll {
                        op: op.name().to_string(),
                        factor: extent,
                    },
                ])
            })
            .collect()
    }
}

/// Randomly relocate an elementwise op next to its consumer.
#[derive(Debug)]
pub struct RandomComputeLocation;

impl ScheduleRule for RandomComputeLocation {
    fn name(&self) -> &'static str {
        "random-compute-location"
    }

    fn apply(&self, unit: &PrimUnit, op: &KernelOp, seed: u64) -> Vec<Trace> {
        let KernelOp::Elementwise(_) = op else {
            return Vec::new();
        };
        let Some(consumer) = unit.consumer_of(op) else {
            return Vec::new();
        };
        let mut rng = fastrand::Rng::with_seed(seed);
        if rng.bool() {
            vec![Trace::from_steps(vec![TraceStep::ComputeAt {
                op: op.name().to_string(),
                consumer: consumer.name().to_string(),
            }])]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_ir::{tensor, DataType, ProgramModule, UnitBuilder};

    fn matmul_module() -> ProgramModule {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[64, 64], DataType::F32),
                tensor("b", &[64, 64], DataType::F32),
                tensor("c", &[64, 64], DataType::F32),
            )
            .build();
        ProgramModule::single(unit)
    }

    fn rules() -> Vec<Arc<dyn ScheduleRule>> {
        vec![
            Arc::new(MultiLevelTiling {
                structure: "SSRSRS",
                thread_binds: false,
            }),
            Arc::new(ParallelizeVectorizeUnroll {
                max_jobs_per_core: 16,
                max_vectorize_extent: 64,
                unroll_max_steps: vec![0, 16, 64],
            }),
        ]
    }

    #[test]
    fn test_space_is_nonempty_and_deterministic() {
        let module = matmul_module();
        let space = RuleBasedSpace::new();
        let first = space.generate(&module, &rules(), 42);
        let second = space.generate(&module, &rules(), 42);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_candidate_cap() {
        let module = matmul_module();
        let space = RuleBasedSpace::new().with_max_candidates(4);
        let candidates = space.generate(&module, &rules(), 7);
        assert!(candidates.len() <= 4);
    }

    #[test]
    fn test_tiling_skips_oversized_factors() {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[8, 8], DataType::F32),
                tensor("b", &[8, 8], DataType::F32),
                tensor("c", &[8, 8], DataType::F32),
            )
            .build();
        let rule = MultiLevelTiling {
            structure: "SSRSRS",
            thread_binds: false,
        };
        let op = unit.body[0].clone();
        assert!(rule.apply(&unit, &op, 0).is_empty());
    }
}
