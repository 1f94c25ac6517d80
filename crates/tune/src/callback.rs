//! Measurement callbacks fired after each candidate is measured.

use crate::context::TuneContext;
use crate::cost_model::CostModel;
use crate::runner::RunResult;
use anyhow::Result;
use tracing::info;
use tuneforge_database::{Database, TuningRecord, WorkloadId};
use tuneforge_ir::Schedule;

/// Everything a callback may observe or touch after one measurement.
pub struct MeasureEvent<'a> {
    pub task: &'a TuneContext,
    pub trial: usize,
    pub schedule: &'a Schedule,
    pub result: &'a RunResult,
    pub workload_id: WorkloadId,
    pub database: &'a dyn Database,
    pub cost_model: &'a mut dyn CostModel,
}

pub trait MeasureCallback: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, event: &mut MeasureEvent<'_>) -> Result<()>;
}

/// Persist the measured candidate as a tuning record.
pub struct AddToDatabase;

impl MeasureCallback for AddToDatabase {
    fn name(&self) -> &'static str {
        "add-to-database"
    }

    fn apply(&self, event: &mut MeasureEvent<'_>) -> Result<()> {
        event.database.commit_record(TuningRecord::new(
            event.workload_id,
            event.schedule.trace().clone(),
            event.result.run_secs.clone(),
        ))
    }
}

/// Log the measurement at info level for auditability.
pub struct EchoStatistics;

impl MeasureCallback for EchoStatistics {
    fn name(&self) -> &'static str {
        "echo-statistics"
    }

    fn apply(&self, event: &mut MeasureEvent<'_>) -> Result<()> {
        info!(
            task = %event.task.task_name,
            trial = event.trial,
            mean_secs = event.result.mean_secs(),
            trace_len = event.schedule.trace().len(),
            "measured candidate"
        );
        Ok(())
    }
}

/// Fold the observation into the cost model.
pub struct UpdateCostModel;

impl MeasureCallback for UpdateCostModel {
    fn name(&self) -> &'static str {
        "update-cost-model"
    }

    fn apply(&self, event: &mut MeasureEvent<'_>) -> Result<()> {
        let cost = event.result.mean_secs();
        event.cost_model.update(event.schedule, cost)
    }
}

/// The default callback set.
pub fn default_measure_callbacks() -> Vec<Box<dyn MeasureCallback>> {
    vec![
        Box::new(AddToDatabase),
        Box::new(EchoStatistics),
        Box::new(UpdateCostModel),
    ]
}
