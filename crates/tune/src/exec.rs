//! Execution plans: lowering a scheduled module into something the local
//! runner can actually time.
//!
//! The plan interprets the op body on ndarray buffers, honoring the tile,
//! parallel, and vectorize decisions recorded in the trace. This is the
//! stand-in for a real build backend; the seam is [`crate::Builder`].

use anyhow::{anyhow, bail, Result};
use ndarray::Array2;
use rayon::prelude::*;
use std::collections::HashMap;
use tuneforge_ir::{ElementwiseFunc, KernelOp, Schedule, TraceStep};

/// Per-op lowering of the schedule decisions that affect execution.
#[derive(Debug, Clone)]
pub struct OpExec {
    pub op: KernelOp,
    pub tiling: Option<(usize, usize, usize)>,
    pub parallel: bool,
    pub vector_width: usize,
}

/// An executable rendition of one scheduled module.
#[derive(Debug, Clone)]
pub struct ExecPlan {
    ops: Vec<OpExec>,
    seed: u64,
}

impl ExecPlan {
    /// Read the decisions off the trace and attach them to each op.
    pub fn lower(schedule: &Schedule, seed: u64) -> Self {
        let mut ops = Vec::new();
        for unit in schedule.module().entries.values() {
            for op in &unit.body {
                let mut exec = OpExec {
                    op: op.clone(),
                    tiling: None,
                    parallel: false,
                    vector_width: 1,
                };
                for step in schedule.trace().steps() {
                    if step.op() != op.name() {
                        continue;
                    }
                    match step {
                        TraceStep::Tile { factors, .. } => exec.tiling = Some(*factors),
                        TraceStep::Parallel { .. } => exec.parallel = true,
                        TraceStep::Vectorize { width, .. } => exec.vector_width = *width,
                        TraceStep::Unroll { .. } | TraceStep::ComputeAt { .. } => {}
                    }
                }
                ops.push(exec);
            }
        }
        Self { ops, seed }
    }

    pub fn ops(&self) -> &[OpExec] {
        &self.ops
    }

    /// Run every op once on seeded random inputs.
    pub fn execute(&self) -> Result<()> {
        let mut buffers: HashMap<String, Array2<f32>> = HashMap::new();
        for exec in &self.ops {
            match &exec.op {
                KernelOp::Matmul(op) => {
                    let (m, k) = op.lhs.dims2();
                    let (_, n) = op.rhs.dims2();
                    let lhs = fetch(&mut buffers, &op.lhs.name, (m, k), self.seed);
                    let rhs = fetch(&mut buffers, &op.rhs.name, (k, n), self.seed);
                    let out = matmul(&lhs, &rhs, exec)?;
                    buffers.insert(op.result.name.clone(), out);
                }
                KernelOp::LayerNorm(op) => {
                    let dims = op.input.dims2();
                    let input = fetch(&mut buffers, &op.input.name, dims, self.seed);
                    buffers.insert(op.result.name.clone(), layer_norm(&input, op.epsilon));
                }
                KernelOp::Elementwise(op) => {
                    let dims = op.input.dims2();
                    let input = fetch(&mut buffers, &op.input.name, dims, self.seed);
                    buffers.insert(op.result.name.clone(), elementwise(&input, op.func));
                }
                KernelOp::Reduce(op) => {
                    let dims = op.input.dims2();
                    let input = fetch(&mut buffers, &op.input.name, dims, self.seed);
                    buffers.insert(op.result.name.clone(), reduce(&input, op.axis)?);
                }
            }
        }
        Ok(())
    }
}

/// Materialize (or reuse) a buffer, seeding fresh inputs deterministically
/// from the plan seed and the tensor name.
fn fetch(
    buffers: &mut HashMap<String, Array2<f32>>,
    name: &str,
    dims: (usize, usize),
    seed: u64,
) -> Array2<f32> {
    if let Some(existing) = buffers.get(name) {
        return existing.clone();
    }
    let mut rng = fastrand::Rng::with_seed(crate::mutator::hash_seed(seed, name));
    let data = Array2::from_shape_fn(dims, |_| rng.f32() * 2.0 - 1.0);
    buffers.insert(name.to_string(), data.clone());
    data
}

fn matmul(lhs: &Array2<f32>, rhs: &Array2<f32>, exec: &OpExec) -> Result<Array2<f32>> {
    let (m, k) = lhs.dim();
    let (k2, n) = rhs.dim();
    if k != k2 {
        bail!("matmul shape mismatch: ({m},{k}) x ({k2},{n})");
    }
    let (_, _, bk) = exec.tiling.unwrap_or((m.max(1), n.max(1), k.max(1)));
    let bk = bk.max(1);
    let vw = exec.vector_width.max(1);

    let compute_row = |i: usize| -> Vec<f32> {
        let mut row = vec![0.0f32; n];
        for k0 in (0..k).step_by(bk) {
            let k_end = (k0 + bk).min(k);
            for kk in k0..k_end {
                let aik = lhs[[i, kk]];
                // Inner loop walks the output row in vector-width lanes.
                for (chunk_idx, chunk) in row.chunks_mut(vw).enumerate() {
                    let j0 = chunk_idx * vw;
                    for (lane, slot) in chunk.iter_mut().enumerate() {
                        *slot += aik * rhs[[kk, j0 + lane]];
                    }
                }
            }
        }
        row
    };

    let rows: Vec<Vec<f32>> = if exec.parallel {
        (0..m).into_par_iter().map(compute_row).collect()
    } else {
        (0..m).map(compute_row).collect()
    };
    Array2::from_shape_vec((m, n), rows.concat())
        .map_err(|e| anyhow!("matmul output shape error: {e}"))
}

fn layer_norm(input: &Array2<f32>, epsilon: f32) -> Array2<f32> {
    let mut out = input.clone();
    for mut row in out.rows_mut() {
        let len = row.len().max(1) as f32;
        let mean = row.sum() / len;
        let var = row.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / len;
        let denom = (var + epsilon).sqrt();
        row.mapv_inplace(|x| (x - mean) / denom);
    }
    out
}

fn elementwise(input: &Array2<f32>, func: ElementwiseFunc) -> Array2<f32> {
    match func {
        ElementwiseFunc::Relu => input.mapv(|x| x.max(0.0)),
        ElementwiseFunc::Gelu => input.mapv(|x| 0.5 * x * (1.0 + (0.7978845608 * (x + 0.044715 * x * x * x)).tanh())),
        ElementwiseFunc::Exp => input.mapv(f32::exp),
    }
}

fn reduce(input: &Array2<f32>, axis: usize) -> Result<Array2<f32>> {
    let (rows, cols) = input.dim();
    match axis {
        0 => {
            let mut out = Array2::zeros((1, cols));
            for i in 0..rows {
                for j in 0..cols {
                    out[[0, j]] += input[[i, j]];
                }
            }
            Ok(out)
        }
        1 => {
            let mut out = Array2::zeros((rows, 1));
            for i in 0..rows {
                for j in 0..cols {
                    out[[i, 0]] += input[[i, j]];
                }
            }
            Ok(out)
        }
        _ => bail!("reduce axis must be 0 or 1, got {axis}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_ir::{tensor, DataType, ProgramModule, Trace, UnitBuilder};

    fn scheduled(trace: Trace) -> Schedule {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[16, 16], DataType::F32),
                tensor("b", &[16, 16], DataType::F32),
                tensor("c", &[16, 16], DataType::F32),
            )
            .layer_norm(
                "ln",
                tensor("c", &[16, 16], DataType::F32),
                tensor("d", &[16, 16], DataType::F32),
                1e-5,
            )
            .build();
        let mut schedule = Schedule::new(ProgramModule::single(unit));
        schedule.apply_trace(&trace).unwrap();
        schedule
    }

    #[test]
    fn test_lowering_reads_decisions() {
        let schedule = scheduled(Trace::from_steps(vec![
            TraceStep::Tile {
                op: "mm".into(),
                factors: (8, 8, 4),
            },
            TraceStep::Parallel { op: "mm".into() },
            TraceStep::Vectorize {
                op: "mm".into(),
                width: 8,
            },
        ]));
        let plan = ExecPlan::lower(&schedule, 1);
        assert_eq!(plan.ops().len(), 2);
        assert_eq!(plan.ops()[0].tiling, Some((8, 8, 4)));
        assert!(plan.ops()[0].parallel);
        assert_eq!(plan.ops()[0].vector_width, 8);
        assert!(!plan.ops()[1].parallel);
    }

    #[test]
    fn test_execute_runs_all_ops() {
        let schedule = scheduled(Trace::new());
        let plan = ExecPlan::lower(&schedule, 42);
        plan.execute().unwrap();
    }

    #[test]
    fn test_tiled_matmul_matches_untiled() {
        let mut rng = fastrand::Rng::with_seed(5);
        let a = Array2::from_shape_fn((8, 12), |_| rng.f32());
        let b = Array2::from_shape_fn((12, 6), |_| rng.f32());
        let plain = OpExec {
            op: dummy_op(),
            tiling: None,
            parallel: false,
            vector_width: 1,
        };
        let tiled = OpExec {
            op: dummy_op(),
            tiling: Some((4, 4, 4)),
            parallel: true,
            vector_width: 4,
        };
        let x = matmul(&a, &b, &plain).unwrap();
        let y = matmul(&a, &b, &tiled).unwrap();
        let max_diff = (&x - &y).mapv(f32::abs).fold(0.0f32, |acc, &v| acc.max(v));
        assert!(max_diff < 1e-4);
    }

    fn dummy_op() -> KernelOp {
        UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[8, 12], DataType::F32),
                tensor("b", &[12, 6], DataType::F32),
                tensor("c", &[8, 6], DataType::F32),
            )
            .build()
            .body[0]
            .clone()
    }
}
