//! Postprocessor checks applied to candidate schedules before measurement.

use tuneforge_ir::{KernelOp, Schedule, TraceStep};

/// Accept or reject a candidate schedule. Rejected candidates are discarded
/// without being measured.
pub trait Postproc: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, schedule: &Schedule) -> bool;
}

/// Every loop extent must be static and non-zero.
pub struct DisallowDynamicLoop;

impl Postproc for DisallowDynamicLoop {
    fn name(&self) -> &'static str {
        "disallow-dynamic-loop"
    }

    fn check(&self, schedule: &Schedule) -> bool {
        schedule.module().entries.values().all(|unit| {
            unit.params
                .iter()
                .all(|spec| spec.shape.iter().all(|&dim| dim > 0))
        })
    }
}

/// At most one parallel and one vectorize decision per op.
pub struct RewriteParallelVectorizeUnroll;

impl Postproc for RewriteParallelVectorizeUnroll {
    fn name(&self) -> &'static str {
        "rewrite-parallel-vectorize-unroll"
    }

    fn check(&self, schedule: &Schedule) -> bool {
        let steps = schedule.trace().steps();
        for (i, step) in steps.iter().enumerate() {
            let duplicate = steps[i + 1..].iter().any(|other| match (step, other) {
                (TraceStep::Parallel { op: a }, TraceStep::Parallel { op: b }) => a == b,
                (TraceStep::Vectorize { op: a, .. }, TraceStep::Vectorize { op: b, .. }) => a == b,
                _ => false,
            });
            if duplicate {
                return false;
            }
        }
        true
    }
}

/// Tile factors must not exceed the dimensions of the op they tile.
pub struct RewriteReductionBlock;

impl Postproc for RewriteReductionBlock {
    fn name(&self) -> &'static str {
        "rewrite-reduction-block"
    }

    fn check(&self, schedule: &Schedule) -> bool {
        for step in schedule.trace().steps() {
            let TraceStep::Tile { op, factors } = step else {
                continue;
            };
            for unit in schedule.module().entries.values() {
                if let Some(KernelOp::Matmul(matmul)) = unit.op(op) {
                    let (m, k) = matmul.lhs.dims2();
                    let (_, n) = matmul.rhs.dims2();
                    let (tm, tn, tk) = *factors;
                    if tm > m || tn > n || tk > k {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Device targets require every matmul to be tiled so its loops can be
/// bound to thread blocks.
pub struct RewriteUnboundBlock;

impl Postproc for RewriteUnboundBlock {
    fn name(&self) -> &'static str {
        "rewrite-unbound-block"
    }

    fn check(&self, schedule: &Schedule) -> bool {
        for unit in schedule.module().entries.values() {
            for op in &unit.body {
                let KernelOp::Matmul(_) = op else { continue };
                let tiled = schedule.trace().steps().iter().any(
                    |step| matches!(step, TraceStep::Tile { op: name, .. } if name == op.name()),
                );
                if !tiled {
                    return false;
                }
            }
        }
        true
    }
}

/// Reject candidates whose tile volume exceeds the device thread budget.
pub struct VerifyDeviceLimit {
    pub max_threads: usize,
}

impl Postproc for VerifyDeviceLimit {
    fn name(&self) -> &'static str {
        "verify-device-limit"
    }

    fn check(&self, schedule: &Schedule) -> bool {
        schedule.trace().steps().iter().all(|step| match step {
            TraceStep::Tile {
                factors: (tm, tn, _),
                ..
            } => tm * tn <= self.max_threads,
            _ => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_ir::{tensor, DataType, ProgramModule, Trace, UnitBuilder};

    fn tiled_schedule(factors: (usize, usize, usize)) -> Schedule {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[32, 32], DataType::F32),
                tensor("b", &[32, 32], DataType::F32),
                tensor("c", &[32, 32], DataType::F32),
            )
            .build();
        let mut schedule = Schedule::new(ProgramModule::single(unit));
        schedule
            .apply_trace(&Trace::from_steps(vec![TraceStep::Tile {
                op: "mm".into(),
                factors,
            }]))
            .unwrap();
        schedule
    }

    #[test]
    fn test_reduction_block_bounds_factors() {
        assert!(RewriteReductionBlock.check(&tiled_schedule((16, 16, 16))));
        assert!(!RewriteReductionBlock.check(&tiled_schedule((64, 16, 16))));
    }

    #[test]
    fn test_device_limit() {
        let check = VerifyDeviceLimit { max_threads: 1024 };
        assert!(check.check(&tiled_schedule((32, 32, 16))));
        let strict = VerifyDeviceLimit { max_threads: 256 };
        assert!(!strict.check(&tiled_schedule((32, 32, 16))));
    }

    #[test]
    fn test_duplicate_parallel_rejected() {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[8, 8], DataType::F32),
                tensor("b", &[8, 8], DataType::F32),
                tensor("c", &[8, 8], DataType::F32),
            )
            .build();
        let mut schedule = Schedule::new(ProgramModule::single(unit));
        schedule
            .apply_trace(&Trace::from_steps(vec![
                TraceStep::Parallel { op: "mm".into() },
                TraceStep::Parallel { op: "mm".into() },
            ]))
            .unwrap();
        assert!(!RewriteParallelVectorizeUnroll.check(&schedule));
    }

    #[test]
    fn test_unbound_block_requires_tiling() {
        let schedule = tiled_schedule((16, 16, 16));
        assert!(RewriteUnboundBlock.check(&schedule));
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[8, 8], DataType::F32),
                tensor("b", &[8, 8], DataType::F32),
                tensor("c", &[8, 8], DataType::F32),
            )
            .build();
        let untiled = Schedule::new(ProgramModule::single(unit));
        assert!(!RewriteUnboundBlock.check(&untiled));
    }
}
