//! Schedules and transformation traces.
//!
//! A trace is the ordered list of decisions that turns a fresh schedule into
//! a candidate implementation. Replaying a recorded trace onto a freshly
//! materialized schedule reproduces the winning candidate.

use crate::module::ProgramModule;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// One schedule decision, always attached to an op by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TraceStep {
    Tile {
        op: String,
        factors: (usize, usize, usize),
    },
    Parallel {
        op: String,
    },
    Vectorize {
        op: String,
        width: usize,
    },
    Unroll {
        op: String,
        factor: usize,
    },
    ComputeAt {
        op: String,
        consumer: String,
    },
}

impl TraceStep {
    pub fn op(&self) -> &str {
        match self {
            TraceStep::Tile { op, .. }
            | TraceStep::Parallel { op }
            | TraceStep::Vectorize { op, .. }
            | TraceStep::Unroll { op, .. }
            | TraceStep::ComputeAt { op, .. } => op,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Trace {
    steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<TraceStep>) -> Self {
        Self { steps }
    }

    pub fn push(&mut self, step: TraceStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Concatenation of two traces, in order.
    pub fn extended(&self, other: &Trace) -> Trace {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        Trace { steps }
    }
}

/// A program module plus the decisions applied to it so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    module: ProgramModule,
    trace: Trace,
}

impl Schedule {
    /// Fresh schedule with an empty trace.
    pub fn new(module: ProgramModule) -> Self {
        Self {
            module,
            trace: Trace::new(),
        }
    }

    pub fn module(&self) -> &ProgramModule {
        &self.module
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Replay `trace` onto this schedule. Every step must reference an op
    /// present in the module; an unknown op means the trace was recorded
    /// against a different program.
    pub fn apply_trace(&mut self, trace: &Trace) -> Result<()> {
        for step in trace.steps() {
            if !self.module.has_op(step.op()) {
                bail!(
                    "trace step references unknown op `{}`; trace does not match module",
                    step.op()
                );
            }
            if let TraceStep::ComputeAt { consumer, .. } = step {
                if !self.module.has_op(consumer) {
                    bail!("compute-at consumer `{consumer}` not found in module");
                }
            }
            self.trace.push(step.clone());
        }
        Ok(())
    }
}
