//! Tuning-policy resolution.
//!
//! Every tunable collaborator is supplied as an [`Override`]: use the
//! default, take this instance, or call this factory. Target-dependent
//! defaults come from a closed per-kind profile table; an unrecognized
//! target kind is an error, never a guess.

use crate::error::{TuneError, TuneResult};
use std::path::Path;
use std::sync::Arc;
use tuneforge_database::{DynDatabase, JsonDatabase};
use tuneforge_ir::Target;
use tuneforge_tune::{
    default_measure_callbacks, AutoInline, Builder, CostModel, CrossThreadReduction,
    LinearCostModel, LocalBuilder, LocalRunner, MeasureCallback, MultiLevelTiling, MutateComputeLocation,
    MutateUnroll, MutatorProbs, ParallelizeVectorizeUnroll, Postproc, RandomComputeLocation,
    RewriteParallelVectorizeUnroll, RewriteReductionBlock, RewriteUnboundBlock, DisallowDynamicLoop,
    RoundRobin, RuleBasedSpace, Runner, ScheduleRule, SearchConfig, SpaceGenerator, TaskScheduler,
    TuneContext, VerifyDeviceLimit,
};

/// One resolvable parameter: absent, ready-made, or deferred construction.
pub enum Override<T> {
    Default,
    Instance(T),
    Factory(Box<dyn FnOnce() -> T + Send>),
}

impl<T> Default for Override<T> {
    fn default() -> Self {
        Override::Default
    }
}

impl<T> Override<T> {
    pub fn instance(value: T) -> Self {
        Override::Instance(value)
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Override::Factory(Box::new(f))
    }

    fn resolve_with(self, default: impl FnOnce() -> T) -> T {
        match self {
            Override::Default => default(),
            Override::Instance(value) => value,
            Override::Factory(factory) => factory(),
        }
    }
}

/// Closed set of target families with built-in tuning profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Llvm,
    Cuda,
}

impl TargetKind {
    pub fn resolve(target: &Target) -> TuneResult<Self> {
        match target.kind() {
            "llvm" => Ok(TargetKind::Llvm),
            "cuda" => Ok(TargetKind::Cuda),
            other => Err(TuneError::UnsupportedTarget {
                kind: other.to_string(),
            }),
        }
    }
}

/// Default policy constructors for one target family. Adding a target kind
/// is one more entry in [`target_profile`].
pub struct TargetProfile {
    pub sch_rules: fn() -> Vec<Arc<dyn ScheduleRule>>,
    pub postprocs: fn() -> Vec<Arc<dyn Postproc>>,
    pub mutator_probs: fn() -> MutatorProbs,
}

pub fn target_profile(kind: TargetKind) -> TargetProfile {
    match kind {
        TargetKind::Llvm => TargetProfile {
            sch_rules: llvm_sch_rules,
            postprocs: llvm_postprocs,
            mutator_probs: llvm_mutator_probs,
        },
        TargetKind::Cuda => TargetProfile {
            sch_rules: cuda_sch_rules,
            postprocs: cuda_postprocs,
            mutator_probs: cuda_mutator_probs,
        },
    }
}

fn llvm_sch_rules() -> Vec<Arc<dyn ScheduleRule>> {
    vec![
        Arc::new(AutoInline {
            into_producer: false,
            into_consumer: true,
        }),
        Arc::new(MultiLevelTiling {
            structure: "SSRSRS",
            thread_binds: false,
        }),
        Arc::new(ParallelizeVectorizeUnroll {
            max_jobs_per_core: 16,
            max_vectorize_extent: 64,
            unroll_max_steps: vec![0, 16, 64, 512],
        }),
        Arc::new(RandomComputeLocation),
    ]
}

fn llvm_postprocs() -> Vec<Arc<dyn Postproc>> {
    vec![
        Arc::new(DisallowDynamicLoop),
        Arc::new(RewriteParallelVectorizeUnroll),
        Arc::new(RewriteReductionBlock),
    ]
}

fn llvm_mutator_probs() -> MutatorProbs {
    vec![
        (Arc::new(MutateComputeLocation), 0.05),
        (Arc::new(MutateUnroll), 0.03),
    ]
}

fn cuda_sch_rules() -> Vec<Arc<dyn ScheduleRule>> {
    vec![
        Arc::new(MultiLevelTiling {
            structure: "SSSRRSRS",
            thread_binds: true,
        }),
        Arc::new(AutoInline {
            into_producer: true,
            into_consumer: true,
        }),
        Arc::new(CrossThreadReduction {
            thread_extents: vec![4, 8, 16, 32, 64, 128, 256, 512],
        }),
        Arc::new(ParallelizeVectorizeUnroll {
            max_jobs_per_core: -1,
            max_vectorize_extent: -1,
            unroll_max_steps: vec![0, 16, 64, 512, 1024],
        }),
    ]
}

fn cuda_postprocs() -> Vec<Arc<dyn Postproc>> {
    vec![
        Arc::new(DisallowDynamicLoop),
        Arc::new(RewriteUnboundBlock),
        Arc::new(RewriteParallelVectorizeUnroll),
        Arc::new(RewriteReductionBlock),
        Arc::new(VerifyDeviceLimit { max_threads: 1024 }),
    ]
}

fn cuda_mutator_probs() -> MutatorProbs {
    vec![(Arc::new(MutateUnroll), 0.1)]
}

pub fn resolve_space(space: Override<Arc<dyn SpaceGenerator>>) -> Arc<dyn SpaceGenerator> {
    space.resolve_with(|| Arc::new(RuleBasedSpace::new()))
}

pub fn resolve_sch_rules(
    sch_rules: Override<Vec<Arc<dyn ScheduleRule>>>,
    kind: TargetKind,
) -> TuneResult<Vec<Arc<dyn ScheduleRule>>> {
    let rules = sch_rules.resolve_with(|| (target_profile(kind).sch_rules)());
    if rules.is_empty() {
        return Err(TuneError::InvalidArgument {
            param: "sch_rules",
            got: "empty rule list".to_string(),
        });
    }
    Ok(rules)
}

pub fn resolve_postprocs(
    postprocs: Override<Vec<Arc<dyn Postproc>>>,
    kind: TargetKind,
) -> Vec<Arc<dyn Postproc>> {
    postprocs.resolve_with(|| (target_profile(kind).postprocs)())
}

pub fn resolve_mutator_probs(
    mutator_probs: Override<MutatorProbs>,
    kind: TargetKind,
) -> TuneResult<MutatorProbs> {
    let probs = mutator_probs.resolve_with(|| (target_profile(kind).mutator_probs)());
    let total: f64 = probs.iter().map(|(_, p)| *p).sum();
    for (mutator, prob) in &probs {
        if !prob.is_finite() || *prob < 0.0 {
            return Err(TuneError::InvalidArgument {
                param: "mutator_probs",
                got: format!("probability {prob} for `{}`", mutator.name()),
            });
        }
    }
    if total > 1.0 {
        return Err(TuneError::InvalidArgument {
            param: "mutator_probs",
            got: format!("probabilities sum to {total}, expected at most 1"),
        });
    }
    Ok(probs)
}

pub fn resolve_builder(builder: Override<Box<dyn Builder>>) -> Box<dyn Builder> {
    builder.resolve_with(|| Box::new(LocalBuilder::new()))
}

pub fn resolve_runner(runner: Override<Box<dyn Runner>>) -> Box<dyn Runner> {
    runner.resolve_with(|| Box::new(LocalRunner::new()))
}

pub fn resolve_cost_model(cost_model: Override<Box<dyn CostModel>>) -> Box<dyn CostModel> {
    cost_model.resolve_with(|| Box::new(LinearCostModel::new()))
}

pub fn resolve_callbacks(
    callbacks: Override<Vec<Box<dyn MeasureCallback>>>,
) -> Vec<Box<dyn MeasureCallback>> {
    callbacks.resolve_with(default_measure_callbacks)
}

/// Default record-store layout: two sibling JSON files under the working
/// directory, named from the task.
pub fn resolve_database(
    database: Override<DynDatabase>,
    task_name: &str,
    work_dir: &Path,
) -> TuneResult<DynDatabase> {
    match database {
        Override::Default => {
            let path_workload = work_dir.join(format!("{task_name}_database_workload.json"));
            let path_tuning_record =
                work_dir.join(format!("{task_name}_database_tuning_record.json"));
            let db = JsonDatabase::new(&path_workload, &path_tuning_record)?;
            Ok(Arc::new(db))
        }
        Override::Instance(db) => Ok(db),
        Override::Factory(factory) => Ok(factory()),
    }
}

pub fn resolve_extractor(
    extractor: Override<Box<dyn crate::extract::TaskExtractor>>,
) -> Box<dyn crate::extract::TaskExtractor> {
    extractor.resolve_with(|| Box::new(crate::extract::GraphExtractor))
}

pub fn resolve_model_builder(
    model_builder: Override<Box<dyn crate::history::ModelBuilder>>,
) -> Box<dyn crate::history::ModelBuilder> {
    model_builder.resolve_with(|| Box::new(crate::history::LocalModelBuilder))
}

pub fn resolve_task_name(task_name: Option<String>) -> TuneResult<String> {
    let name = task_name.unwrap_or_else(|| "main".to_string());
    if name.trim().is_empty() {
        return Err(TuneError::InvalidArgument {
            param: "task_name",
            got: format!("{name:?}"),
        });
    }
    Ok(name)
}

pub fn resolve_num_threads(num_threads: Option<usize>) -> TuneResult<usize> {
    match num_threads {
        Some(0) => Err(TuneError::InvalidArgument {
            param: "num_threads",
            got: "0".to_string(),
        }),
        Some(n) => Ok(n),
        None => Ok(std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)),
    }
}

pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| fastrand::u64(..))
}

/// Everything a scheduler factory receives.
pub struct SchedulerParts {
    pub tasks: Vec<TuneContext>,
    pub config: SearchConfig,
    pub builder: Box<dyn Builder>,
    pub runner: Box<dyn Runner>,
    pub database: DynDatabase,
    pub cost_model: Box<dyn CostModel>,
    pub callbacks: Vec<Box<dyn MeasureCallback>>,
}

/// Scheduler resolution. The factory shape takes the assembled parts,
/// since a scheduler cannot exist without its task list and collaborators.
pub enum SchedulerOverride {
    Default,
    Instance(Box<dyn TaskScheduler>),
    Factory(Box<dyn FnOnce(SchedulerParts) -> Box<dyn TaskScheduler> + Send>),
}

impl Default for SchedulerOverride {
    fn default() -> Self {
        SchedulerOverride::Default
    }
}

pub fn resolve_task_scheduler(
    scheduler: SchedulerOverride,
    parts: SchedulerParts,
) -> Box<dyn TaskScheduler> {
    match scheduler {
        SchedulerOverride::Default => Box::new(RoundRobin::new(
            parts.tasks,
            parts.config,
            parts.builder,
            parts.runner,
            parts.database,
            parts.cost_model,
            parts.callbacks,
        )),
        SchedulerOverride::Instance(scheduler) => scheduler,
        SchedulerOverride::Factory(factory) => factory(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaulting_is_deterministic() {
        let first = resolve_sch_rules(Override::Default, TargetKind::Llvm).unwrap();
        let second = resolve_sch_rules(Override::Default, TargetKind::Llvm).unwrap();
        let names = |rules: &[Arc<dyn ScheduleRule>]| -> Vec<&'static str> {
            rules.iter().map(|r| r.name()).collect()
        };
        assert_eq!(names(&first), names(&second));
        assert!(!first.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let target = Target::parse("vulkan -device=0").unwrap();
        let err = TargetKind::resolve(&target).unwrap_err();
        match err {
            TuneError::UnsupportedTarget { kind } => assert_eq!(kind, "vulkan"),
            other => panic!("expected UnsupportedTarget, got {other}"),
        }
    }

    #[test]
    fn test_empty_rule_override_rejected() {
        let err = resolve_sch_rules(Override::Instance(Vec::new()), TargetKind::Llvm).unwrap_err();
        match err {
            TuneError::InvalidArgument { param, .. } => assert_eq!(param, "sch_rules"),
            other => panic!("expected InvalidArgument, got {other}"),
        }
    }

    #[test]
    fn test_mutator_probs_validated() {
        let probs: MutatorProbs = vec![(Arc::new(MutateUnroll), 1.5)];
        let err = resolve_mutator_probs(Override::Instance(probs), TargetKind::Llvm).unwrap_err();
        match err {
            TuneError::InvalidArgument { param, .. } => assert_eq!(param, "mutator_probs"),
            other => panic!("expected InvalidArgument, got {other}"),
        }
    }

    #[test]
    fn test_factory_shape_is_invoked() {
        let space = resolve_space(Override::factory(|| {
            Arc::new(RuleBasedSpace::new().with_max_candidates(8)) as Arc<dyn SpaceGenerator>
        }));
        assert_eq!(space.name(), "rule-based-space");
    }

    #[test]
    fn test_cuda_profile_differs_from_llvm() {
        let llvm = resolve_postprocs(Override::Default, TargetKind::Llvm);
        let cuda = resolve_postprocs(Override::Default, TargetKind::Cuda);
        assert_ne!(llvm.len(), cuda.len());
    }
}
