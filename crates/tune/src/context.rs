//! Tuning-task contexts.

use crate::mutator::MutatorProbs;
use crate::space::{ScheduleRule, SpaceGenerator};
use crate::postproc::Postproc;
use std::sync::Arc;
use tuneforge_ir::{ProgramModule, Target};

/// Immutable bundle describing one independent tuning task: the program,
/// the target, and the resolved policies. Built once by policy resolution
/// and handed to the scheduler; nothing mutates it afterwards.
#[derive(Clone)]
pub struct TuneContext {
    pub module: ProgramModule,
    pub target: Target,
    pub space: Arc<dyn SpaceGenerator>,
    pub sch_rules: Vec<Arc<dyn ScheduleRule>>,
    pub postprocs: Vec<Arc<dyn Postproc>>,
    pub mutator_probs: MutatorProbs,
    pub task_name: String,
    pub seed: u64,
    pub num_threads: usize,
}

impl TuneContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        module: ProgramModule,
        target: Target,
        space: Arc<dyn SpaceGenerator>,
        sch_rules: Vec<Arc<dyn ScheduleRule>>,
        postprocs: Vec<Arc<dyn Postproc>>,
        mutator_probs: MutatorProbs,
        task_name: String,
        seed: u64,
        num_threads: usize,
    ) -> Self {
        Self {
            module,
            target,
            space,
            sch_rules,
            postprocs,
            mutator_probs,
            task_name,
            seed,
            num_threads,
        }
    }
}
