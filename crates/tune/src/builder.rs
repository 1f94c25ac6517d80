//! Build backend seam.

use crate::exec::ExecPlan;
use anyhow::Result;
use tuneforge_ir::{Schedule, Target};

/// Output of building one candidate schedule.
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    pub plan: ExecPlan,
}

/// Compiles a candidate schedule into a runnable artifact.
pub trait Builder: Send + Sync {
    fn build(&self, schedule: &Schedule, target: &Target) -> Result<BuiltArtifact>;
}

/// In-process builder: lowers the schedule to an interpreted execution plan.
pub struct LocalBuilder {
    seed: u64,
}

impl LocalBuilder {
    pub fn new() -> Self {
        Self { seed: 0 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for LocalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder for LocalBuilder {
    fn build(&self, schedule: &Schedule, _target: &Target) -> Result<BuiltArtifact> {
        Ok(BuiltArtifact {
            plan: ExecPlan::lower(schedule, self.seed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_ir::{tensor, DataType, ProgramModule, UnitBuilder};

    #[test]
    fn test_local_builder_lowers() {
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
        assert_eq!(artifact.plan.ops().len(), 1);
    }
}
