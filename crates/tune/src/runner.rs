//! Measurement backend seam.

use crate::builder::BuiltArtifact;
use anyhow::Result;
use std::time::Instant;

/// Observed per-repeat runtimes for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub run_secs: Vec<f64>,
}

impl RunResult {
    pub fn mean_secs(&self) -> f64 {
        if self.run_secs.is_empty() {
            return f64::INFINITY;
        }
        self.run_secs.iter().sum::<f64>() / self.run_secs.len() as f64
    }
}

/// Executes a built artifact and reports its runtimes.
pub trait Runner: Send + Sync {
    fn run(&self, artifact: &BuiltArtifact) -> Result<RunResult>;
}

/// In-process runner: warmup to avoid cold-start noise, then timed repeats.
pub struct LocalRunner {
    warmup_runs: usize,
    runs: usize,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self {
            warmup_runs: 1,
            runs: 3,
        }
    }

    pub fn with_runs(mut self, warmup_runs: usize, runs: usize) -> Self {
        self.warmup_runs = warmup_runs;
        self.runs = runs.max(1);
        self
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner for LocalRunner {
    fn run(&self, artifact: &BuiltArtifact) -> Result<RunResult> {
        for _ in 0..self.warmup_runs {
            artifact.plan.execute()?;
        }
        let mut run_secs = Vec::with_capacity(self.runs);
        for _ in 0..self.runs {
            let start = Instant::now();
            artifact.plan.execute()?;
            run_secs.push(start.elapsed().as_secs_f64());
        }
        Ok(RunResult { run_secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Builder, LocalBuilder};
    use tuneforge_ir::{tensor, DataType, ProgramModule, Schedule, Target, UnitBuilder};

    #[test]
    fn test_local_runner_measures() {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[8, 8], DataType::F32),
                tensor("b", &[8, 8], DataType::F32),
                tensor("c", &[8, 8], DataType::F32),
            )
            .build();
        let schedule = Schedule::new(ProgramModule::single(unit));
        let target = Target::parse("llvm").unwrap();
        let artifact = LocalBuilder::new().build(&schedule, &target).unwrap();
        let result = LocalRunner::new().with_runs(0, 2).run(&artifact).unwrap();
        assert_eq!(result.run_secs.len(), 2);
        assert!(result.mean_secs() >= 0.0);
    }
}
