//! History-backed model assembly.
//!
//! After tuning, the best recorded trace per task is replayed onto the
//! task's module. [`HistoryView`] scopes the lookup phase: while it is
//! alive, lookups go against the tuned record store; dropping it ends the
//! apply-history scope.

use anyhow::{Context, Result};
use tracing::{debug, warn};
use tuneforge_database::Database;
use tuneforge_ir::{ModelProgram, ParamMap, Schedule, Target, Trace};

/// Scoped read view over a tuned record store.
pub struct HistoryView<'a> {
    database: &'a dyn Database,
}

impl<'a> HistoryView<'a> {
    pub fn new(database: &'a dyn Database) -> Self {
        debug!("entering apply-history scope");
        Self { database }
    }

    /// Best recorded trace for a module, `None` when nothing was recorded.
    pub fn best_trace(&self, module: &tuneforge_ir::ProgramModule) -> Result<Option<Trace>> {
        let workload = self.database.commit_workload(module)?;
        Ok(self
            .database
            .get_top_k(workload, 1)
            .into_iter()
            .next()
            .map(|record| record.trace))
    }
}

impl Drop for HistoryView<'_> {
    fn drop(&mut self) {
        debug!("leaving apply-history scope");
    }
}

/// The tuned model: one applied schedule per task, in graph order.
pub struct ModelArtifact {
    pub name: String,
    pub schedules: Vec<(String, Schedule)>,
}

/// Builds the final artifact from a model and the tuning history.
pub trait ModelBuilder: Send + Sync {
    fn build(
        &self,
        model: &ModelProgram,
        target: &Target,
        params: Option<&ParamMap>,
        history: &HistoryView<'_>,
    ) -> Result<ModelArtifact>;
}

/// Replays each node's best trace onto its module. Nodes with no recorded
/// result keep the unscheduled module.
pub struct LocalModelBuilder;

impl ModelBuilder for LocalModelBuilder {
    fn build(
        &self,
        model: &ModelProgram,
        _target: &Target,
        _params: Option<&ParamMap>,
        history: &HistoryView<'_>,
    ) -> Result<ModelArtifact> {
        let mut schedules = Vec::with_capacity(model.nodes.len());
        for node in &model.nodes {
            let module = tuneforge_ir::ProgramModule::single(node.unit.clone());
            let mut schedule = Schedule::new(module.clone());
            match history.best_trace(&module)? {
                Some(trace) => {
                    schedule
                        .apply_trace(&trace)
                        .with_context(|| format!("replaying best trace for `{}`", node.task_name))?;
                }
                None => {
                    warn!(task = %node.task_name, "no tuning record, keeping unscheduled module");
                }
            }
            schedules.push((node.task_name.clone(), schedule));
        }
        Ok(ModelArtifact {
            name: model.name.clone(),
            schedules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_database::{Database, JsonDatabase, TuningRecord};
    use tuneforge_ir::{tensor, DataType, ProgramModule, TraceStep, UnitBuilder};

    fn matmul_unit(dim: usize) -> tuneforge_ir::PrimUnit {
        UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[dim, dim], DataType::F32),
                tensor("b", &[dim, dim], DataType::F32),
                tensor("c", &[dim, dim], DataType::F32),
            )
            .build()
    }

    #[test]
    fn test_best_trace_prefers_lower_cost() {
        let db = JsonDatabase::in_memory();
        let module = ProgramModule::single(matmul_unit(32));
        let workload = db.commit_workload(&module).unwrap();
        let slow = Trace::from_steps(vec![TraceStep::Unroll {
            op: "mm".into(),
            factor: 16,
        }]);
        let fast = Trace::from_steps(vec![TraceStep::Tile {
            op: "mm".into(),
            factors: (16, 16, 16),
        }]);
        db.commit_record(TuningRecord::new(workload, slow, vec![2.0]))
            .unwrap();
        db.commit_record(TuningRecord::new(workload, fast.clone(), vec![0.5]))
            .unwrap();

        let history = HistoryView::new(&db);
        let best = history.best_trace(&module).unwrap();
        assert_eq!(best, Some(fast));
    }

    #[test]
    fn test_model_builder_keeps_untuned_nodes() {
        let db = JsonDatabase::in_memory();
        let model = ModelProgram::new("net").with_node("dense", matmul_unit(16));
        let target = Target::parse("llvm").unwrap();
        let history = HistoryView::new(&db);
        let artifact = LocalModelBuilder
            .build(&model, &target, None, &history)
            .unwrap();
        assert_eq!(artifact.schedules.len(), 1);
        assert!(artifact.schedules[0].1.trace().is_empty());
    }
}
