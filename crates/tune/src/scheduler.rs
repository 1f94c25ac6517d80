//! Task scheduling: the run-to-completion measure-and-improve loop.

use crate::builder::Builder;
use crate::callback::{MeasureCallback, MeasureEvent};
use crate::context::TuneContext;
use crate::cost_model::CostModel;
use crate::mutator::{hash_seed, pick_mutator};
use crate::runner::Runner;
use crate::search::SearchConfig;
use anyhow::Result;
use tracing::{debug, info, warn};
use tuneforge_database::DynDatabase;
use tuneforge_ir::{Schedule, Trace};

/// Drives a task list to completion. `tune` is the sole blocking operation
/// of the pipeline; cancellation and retry policy live behind this seam.
pub trait TaskScheduler {
    fn tune(&mut self) -> Result<()>;

    /// The scheduler's cost model, when it owns one. Used by the pipeline
    /// to persist learned state after a run.
    fn cost_model(&self) -> Option<&dyn CostModel> {
        None
    }
}

/// Cycles through tasks, spending `trials_per_iter` trials on each per
/// round until every task has exhausted its budget.
pub struct RoundRobin {
    tasks: Vec<TuneContext>,
    config: SearchConfig,
    builder: Box<dyn Builder>,
    runner: Box<dyn Runner>,
    database: DynDatabase,
    cost_model: Box<dyn CostModel>,
    callbacks: Vec<Box<dyn MeasureCallback>>,
}

impl RoundRobin {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Vec<TuneContext>,
        config: SearchConfig,
        builder: Box<dyn Builder>,
        runner: Box<dyn Runner>,
        database: DynDatabase,
        cost_model: Box<dyn CostModel>,
        callbacks: Vec<Box<dyn MeasureCallback>>,
    ) -> Self {
        Self {
            tasks,
            config,
            builder,
            runner,
            database,
            cost_model,
            callbacks,
        }
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Pick the next candidate trace for a task.
    fn select_trace(&self, ti: usize, candidates: &[Trace], trial: usize) -> Trace {
        let task = &self.tasks[ti];
        let seed = hash_seed(task.seed, &task.task_name).wrapping_add(trial as u64);
        match self.config {
            SearchConfig::ReplayTrace { .. } => candidates[(trial - 1) % candidates.len()].clone(),
            SearchConfig::Evolutionary { .. } => {
                let population = self.config.population().min(candidates.len());
                let mut rng = fastrand::Rng::with_seed(seed);
                let mut best: Option<(f64, &Trace)> = None;
                for _ in 0..population {
                    let candidate = &candidates[rng.usize(..candidates.len())];
                    let mut probe = Schedule::new(task.module.clone());
                    if probe.apply_trace(candidate).is_err() {
                        continue;
                    }
                    let predicted = self.cost_model.predict(&probe);
                    if best.map(|(cost, _)| predicted < cost).unwrap_or(true) {
                        best = Some((predicted, candidate));
                    }
                }
                let chosen = best
                    .map(|(_, trace)| trace.clone())
                    .unwrap_or_else(|| candidates[(trial - 1) % candidates.len()].clone());
                match pick_mutator(&task.mutator_probs, seed) {
                    Some(mutator) => mutator.mutate(&chosen, seed).unwrap_or(chosen),
                    None => chosen,
                }
            }
        }
    }
}

impl TaskScheduler for RoundRobin {
    fn tune(&mut self) -> Result<()> {
        let total = self.config.total_trials();
        let per_iter = self.config.trials_per_iter();
        info!(
            tasks = self.tasks.len(),
            total_trials = total,
            "starting round-robin tuning"
        );

        let mut workload_ids = Vec::with_capacity(self.tasks.len());
        let mut candidates = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            workload_ids.push(self.database.commit_workload(&task.module)?);
            let mut generated = task.space.generate(&task.module, &task.sch_rules, task.seed);
            if generated.is_empty() {
                generated.push(Trace::new());
            }
            candidates.push(generated);
        }

        let mut trials = vec![0usize; self.tasks.len()];
        loop {
            let mut progressed = false;
            for ti in 0..self.tasks.len() {
                for _ in 0..per_iter {
                    if trials[ti] >= total {
                        break;
                    }
                    trials[ti] += 1;
                    progressed = true;
                    let trial = trials[ti];
                    let trace = self.select_trace(ti, &candidates[ti], trial);

                    let task = &self.tasks[ti];
                    let mut schedule = Schedule::new(task.module.clone());
                    if let Err(error) = schedule.apply_trace(&trace) {
                        warn!(task = %task.task_name, %error, "candidate trace rejected");
                        continue;
                    }
                    if let Some(failed) =
                        task.postprocs.iter().find(|p| !p.check(&schedule))
                    {
                        debug!(
                            task = %task.task_name,
                            postproc = failed.name(),
                            "candidate rejected by postprocessor"
                        );
                        continue;
                    }
                    let artifact = match self.builder.build(&schedule, &task.target) {
                        Ok(artifact) => artifact,
                        Err(error) => {
                            warn!(task = %task.task_name, %error, "build failed");
                            continue;
                        }
                    };
                    let result = match self.runner.run(&artifact) {
                        Ok(result) => result,
                        Err(error) => {
                            warn!(task = %task.task_name, %error, "run failed");
                            continue;
                        }
                    };

                    let mut event = MeasureEvent {
                        task,
                        trial,
                        schedule: &schedule,
                        result: &result,
                        workload_id: workload_ids[ti],
                        database: self.database.as_ref(),
                        cost_model: self.cost_model.as_mut(),
                    };
                    for callback in &self.callbacks {
                        callback.apply(&mut event)?;
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        info!("round-robin tuning finished");
        Ok(())
    }

    fn cost_model(&self) -> Option<&dyn CostModel> {
        Some(self.cost_model.as_ref())
    }
}
