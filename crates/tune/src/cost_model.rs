//! Cost-model seam and the default learned model.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tuneforge_ir::{KernelOp, Schedule, TraceStep};

/// Predicts candidate cost and learns from measurements. The persisted
/// artifact's format (and file extension) belongs to the implementation;
/// the pipeline only decides the path and the trigger point.
pub trait CostModel: Send {
    fn name(&self) -> &'static str;

    /// Fold one observed measurement into the model.
    fn update(&mut self, schedule: &Schedule, cost_secs: f64) -> Result<()>;

    /// Predicted cost in seconds; lower is better.
    fn predict(&self, schedule: &Schedule) -> f64;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;

    fn file_ext(&self) -> &'static str {
        "json"
    }
}

const NUM_FEATURES: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearState {
    weights: [f64; NUM_FEATURES],
    bias: f64,
    seen: u64,
}

impl Default for LinearState {
    fn default() -> Self {
        Self {
            weights: [0.0; NUM_FEATURES],
            bias: 0.0,
            seen: 0,
        }
    }
}

/// Linear model over coarse schedule features, trained online with SGD.
#[derive(Debug, Clone, Default)]
pub struct LinearCostModel {
    state: LinearState,
    learning_rate: f64,
}

impl LinearCostModel {
    pub fn new() -> Self {
        Self {
            state: LinearState::default(),
            learning_rate: 1e-3,
        }
    }

    pub fn seen(&self) -> u64 {
        self.state.seen
    }

    fn features(schedule: &Schedule) -> [f64; NUM_FEATURES] {
        let mut flops = 0.0f64;
        let mut num_ops = 0.0f64;
        for unit in schedule.module().entries.values() {
            for op in &unit.body {
                num_ops += 1.0;
                match op {
                    KernelOp::Matmul(mm) => {
                        let (m, k) = mm.lhs.dims2();
                        let (_, n) = mm.rhs.dims2();
                        flops += 2.0 * m as f64 * n as f64 * k as f64;
                    }
                    KernelOp::LayerNorm(ln) => {
                        let (r, c) = ln.input.dims2();
                        flops += 5.0 * r as f64 * c as f64;
                    }
                    KernelOp::Elementwise(ew) => {
                        let (r, c) = ew.input.dims2();
                        flops += r as f64 * c as f64;
                    }
                    KernelOp::Reduce(rd) => {
                        let (r, c) = rd.input.dims2();
                        flops += r as f64 * c as f64;
                    }
                }
            }
        }
        let mut tile_volume = 0.0f64;
        let mut parallel = 0.0f64;
        let mut vector = 0.0f64;
        for step in schedule.trace().steps() {
            match step {
                TraceStep::Tile {
                    factors: (tm, tn, tk),
                    ..
                } => tile_volume += (tm * tn * tk) as f64,
                TraceStep::Parallel { .. } => parallel = 1.0,
                TraceStep::Vectorize { width, .. } => vector = *width as f64,
                _ => {}
            }
        }
        [
            (flops + 1.0).ln(),
            num_ops,
            (tile_volume + 1.0).ln(),
            parallel,
            vector,
            schedule.trace().len() as f64,
        ]
    }
}

impl CostModel for LinearCostModel {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn update(&mut self, schedule: &Schedule, cost_secs: f64) -> Result<()> {
        let features = Self::features(schedule);
        let predicted = self.predict(schedule);
        let err = predicted - cost_secs;
        for (weight, feature) in self.state.weights.iter_mut().zip(features) {
            *weight -= self.learning_rate * err * feature;
        }
        self.state.bias -= self.learning_rate * err;
        self.state.seen += 1;
        Ok(())
    }

    fn predict(&self, schedule: &Schedule) -> f64 {
        let features = Self::features(schedule);
        self.state
            .weights
            .iter()
            .zip(features)
            .map(|(w, f)| w * f)
            .sum::<f64>()
            + self.state.bias
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let blob = serde_json::to_vec_pretty(&self.state)?;
        fs::write(path, blob).with_context(|| format!("saving cost model to {}", path.display()))?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let data =
            fs::read(path).with_context(|| format!("loading cost model from {}", path.display()))?;
        self.state = serde_json::from_slice(&data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_ir::{tensor, DataType, ProgramModule, UnitBuilder};

    fn demo_schedule() -> Schedule {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[32, 32], DataType::F32),
                tensor("b", &[32, 32], DataType::F32),
                tensor("c", &[32, 32], DataType::F32),
            )
            .build();
        Schedule::new(ProgramModule::single(unit))
    }

    #[test]
    fn test_update_moves_prediction_toward_observation() {
        let schedule = demo_schedule();
        let mut model = LinearCostModel::new();
        let before = (model.predict(&schedule) - 0.5).abs();
        for _ in 0..200 {
            model.update(&schedule, 0.5).unwrap();
        }
        let after = (model.predict(&schedule) - 0.5).abs();
        assert!(after < before);
        assert_eq!(model.seen(), 200);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.json");
        let schedule = demo_schedule();
        let mut model = LinearCostModel::new();
        for _ in 0..10 {
            model.update(&schedule, 0.25).unwrap();
        }
        model.save(&path).unwrap();

        let mut restored = LinearCostModel::new();
        restored.load(&path).unwrap();
        assert_eq!(restored.seen(), 10);
        assert!((restored.predict(&schedule) - model.predict(&schedule)).abs() < 1e-12);
    }
}
