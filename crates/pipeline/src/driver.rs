//! Tuning entry points.
//!
//! All three entry points share the same skeleton: validate and resolve
//! every policy up front, run the scheduler to completion, then read the
//! best results back out of the record store. Nothing is measured before
//! resolution succeeds.

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tuneforge_database::{Database, DynDatabase};
use tuneforge_ir::{
    canonicalize_module, unit_from_tensors, ModelProgram, ParamMap, ProgramInput, ProgramModule,
    Schedule, Target, TensorSpec,
};
use tuneforge_tune::{
    Builder, CostModel, MeasureCallback, MutatorProbs, Postproc, Runner, ScheduleRule,
    SearchConfig, SpaceGenerator, TaskScheduler, TuneContext,
};

use crate::dedup::dedup_tasks;
use crate::error::{TuneError, TuneResult};
use crate::extract::TaskExtractor;
use crate::history::{HistoryView, ModelArtifact, ModelBuilder};
use crate::policy::{
    resolve_builder, resolve_callbacks, resolve_cost_model, resolve_database, resolve_extractor,
    resolve_model_builder, resolve_mutator_probs, resolve_num_threads, resolve_postprocs,
    resolve_runner, resolve_sch_rules, resolve_seed, resolve_space, resolve_task_name,
    resolve_task_scheduler, Override, SchedulerOverride, SchedulerParts, TargetKind,
};

/// When to persist the scheduler's learned cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveCostModel {
    /// Only after a run that produced at least one result.
    #[default]
    OnResult,
    Always,
    Never,
}

/// Per-call overrides; every field defaults to the target profile or the
/// built-in collaborator.
#[derive(Default)]
pub struct TuneOverrides {
    pub task_name: Option<String>,
    pub num_threads: Option<usize>,
    pub seed: Option<u64>,
    pub space: Override<Arc<dyn SpaceGenerator>>,
    pub sch_rules: Override<Vec<Arc<dyn ScheduleRule>>>,
    pub postprocs: Override<Vec<Arc<dyn Postproc>>>,
    pub mutator_probs: Override<MutatorProbs>,
    pub builder: Override<Box<dyn Builder>>,
    pub runner: Override<Box<dyn Runner>>,
    pub database: Override<DynDatabase>,
    pub cost_model: Override<Box<dyn CostModel>>,
    pub measure_callbacks: Override<Vec<Box<dyn MeasureCallback>>>,
    pub task_scheduler: SchedulerOverride,
    pub save_cost_model: SaveCostModel,
    pub extractor: Override<Box<dyn TaskExtractor>>,
    pub model_builder: Override<Box<dyn ModelBuilder>>,
}

struct ResolvedPolicies {
    space: Arc<dyn SpaceGenerator>,
    sch_rules: Vec<Arc<dyn ScheduleRule>>,
    postprocs: Vec<Arc<dyn Postproc>>,
    mutator_probs: MutatorProbs,
    seed: u64,
    num_threads: usize,
}

fn resolve_policies(overrides: &mut TuneOverrides, kind: TargetKind) -> TuneResult<ResolvedPolicies> {
    let num_threads = resolve_num_threads(overrides.num_threads)?;
    let seed = resolve_seed(overrides.seed);
    let space = resolve_space(std::mem::take(&mut overrides.space));
    let sch_rules = resolve_sch_rules(std::mem::take(&mut overrides.sch_rules), kind)?;
    let postprocs = resolve_postprocs(std::mem::take(&mut overrides.postprocs), kind);
    let mutator_probs = resolve_mutator_probs(std::mem::take(&mut overrides.mutator_probs), kind)?;
    Ok(ResolvedPolicies {
        space,
        sch_rules,
        postprocs,
        mutator_probs,
        seed,
        num_threads,
    })
}

fn save_cost_model_if_requested(
    scheduler: &dyn TaskScheduler,
    policy: SaveCostModel,
    produced_result: bool,
    work_dir: &Path,
    stem: &str,
) -> TuneResult<()> {
    let wanted = match policy {
        SaveCostModel::Always => true,
        SaveCostModel::OnResult => produced_result,
        SaveCostModel::Never => false,
    };
    if !wanted {
        return Ok(());
    }
    if let Some(cost_model) = scheduler.cost_model() {
        let path = work_dir.join(format!("{stem}.{}", cost_model.file_ext()));
        cost_model.save(&path)?;
        info!(path = %path.display(), "saved cost model");
    }
    Ok(())
}

/// Tune a single unit or module end to end. Returns the best schedule
/// found, or `Ok(None)` when the budget produced no measurement.
pub fn tune_unit(
    input: ProgramInput,
    target: &Target,
    config: SearchConfig,
    work_dir: &Path,
    mut overrides: TuneOverrides,
) -> TuneResult<Option<Schedule>> {
    let kind = TargetKind::resolve(target)?;
    let task_name = resolve_task_name(overrides.task_name.take())?;
    let policies = resolve_policies(&mut overrides, kind)?;
    let module = input.into_canonical();

    let database = resolve_database(std::mem::take(&mut overrides.database), &task_name, work_dir)?;
    let context = TuneContext::new(
        module.clone(),
        target.clone(),
        policies.space,
        policies.sch_rules,
        policies.postprocs,
        policies.mutator_probs,
        task_name.clone(),
        policies.seed,
        policies.num_threads,
    );
    let mut scheduler = resolve_task_scheduler(
        overrides.task_scheduler,
        SchedulerParts {
            tasks: vec![context],
            config,
            builder: resolve_builder(overrides.builder),
            runner: resolve_runner(overrides.runner),
            database: database.clone(),
            cost_model: resolve_cost_model(overrides.cost_model),
            callbacks: resolve_callbacks(overrides.measure_callbacks),
        },
    );
    info!(
        task = %task_name,
        target = target.raw(),
        work_dir = %work_dir.display(),
        "tuning unit"
    );
    scheduler.tune()?;

    let best = best_schedule(database.as_ref(), &module)?;
    save_cost_model_if_requested(
        scheduler.as_ref(),
        overrides.save_cost_model,
        best.is_some(),
        work_dir,
        &task_name,
    )?;
    Ok(best)
}

/// Tune the unit described by a tensor-descriptor list. The descriptors are
/// lowered to a unit first; an unrecognized shape pattern is an invalid
/// argument, reported before anything is resolved.
pub fn tune_tensors(
    tensors: &[TensorSpec],
    target: &Target,
    config: SearchConfig,
    work_dir: &Path,
    overrides: TuneOverrides,
) -> TuneResult<Option<Schedule>> {
    let unit = unit_from_tensors(tensors).map_err(|error| TuneError::InvalidArgument {
        param: "tensors",
        got: error.to_string(),
    })?;
    tune_unit(ProgramInput::Unit(unit), target, config, work_dir, overrides)
}

/// Tune a whole model: extract tasks, deduplicate them, tune the survivors
/// under one scheduler, then assemble the artifact from recorded history.
pub fn tune_model(
    model: &ModelProgram,
    target: &Target,
    config: SearchConfig,
    work_dir: &Path,
    params: Option<&ParamMap>,
    mut overrides: TuneOverrides,
) -> TuneResult<ModelArtifact> {
    let kind = TargetKind::resolve(target)?;
    let task_name = resolve_task_name(overrides.task_name.take())?;
    let policies = resolve_policies(&mut overrides, kind)?;
    info!(
        model = %model.name,
        task = %task_name,
        target = target.raw(),
        work_dir = %work_dir.display(),
        "tuning model"
    );

    let extractor = resolve_extractor(std::mem::take(&mut overrides.extractor));
    let mut extracted = extractor.extract(model, target, params)?;
    for task in &mut extracted {
        if task.dispatched.len() != 1 {
            return Err(TuneError::MultiDispatchUnsupported {
                task_name: task.task_name.clone(),
                count: task.dispatched.len(),
            });
        }
        // Normalize before dedup so entry naming cannot fake inequality.
        task.dispatched = std::mem::take(&mut task.dispatched)
            .into_iter()
            .map(canonicalize_module)
            .collect();
    }
    let report = dedup_tasks(extracted);
    info!(
        model = %model.name,
        extracted = report.before,
        scheduled = report.after,
        "extracted tuning tasks"
    );

    let database = resolve_database(std::mem::take(&mut overrides.database), &task_name, work_dir)?;
    let mut tasks = Vec::with_capacity(report.tasks.len());
    for task in report.tasks {
        // Single dispatch enforced above.
        let Some(module) = task.dispatched.into_iter().next() else {
            continue;
        };
        tasks.push(TuneContext::new(
            module,
            target.clone(),
            policies.space.clone(),
            policies.sch_rules.clone(),
            policies.postprocs.clone(),
            policies.mutator_probs.clone(),
            task.task_name,
            policies.seed,
            policies.num_threads,
        ));
    }

    let mut scheduler = resolve_task_scheduler(
        overrides.task_scheduler,
        SchedulerParts {
            tasks,
            config,
            builder: resolve_builder(overrides.builder),
            runner: resolve_runner(overrides.runner),
            database: database.clone(),
            cost_model: resolve_cost_model(overrides.cost_model),
            callbacks: resolve_callbacks(overrides.measure_callbacks),
        },
    );
    scheduler.tune()?;

    let model_builder = resolve_model_builder(std::mem::take(&mut overrides.model_builder));
    let artifact = {
        let history = HistoryView::new(database.as_ref());
        model_builder.build(model, target, params, &history)?
    };
    save_cost_model_if_requested(
        scheduler.as_ref(),
        overrides.save_cost_model,
        !database.is_empty(),
        work_dir,
        &task_name,
    )?;
    Ok(artifact)
}

fn best_schedule(database: &dyn Database, module: &ProgramModule) -> TuneResult<Option<Schedule>> {
    let history = HistoryView::new(database);
    match history.best_trace(module)? {
        Some(trace) => {
            let mut schedule = Schedule::new(module.clone());
            schedule.apply_trace(&trace)?;
            Ok(Some(schedule))
        }
        None => Ok(None),
    }
}
