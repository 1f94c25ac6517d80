//! Pipeline error taxonomy.
//!
//! Every validation error is raised eagerly, before any context is built or
//! the record store is touched, and none is retried at this layer. "No
//! tuning result" is not an error: the unit-level entry points return
//! `Ok(None)` for it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuneError {
    /// A supplied override has an invalid value. Carries the parameter name
    /// and a rendering of what was received so the caller can correct it.
    #[error("invalid argument `{param}`: {got}")]
    InvalidArgument { param: &'static str, got: String },

    /// The target kind has no default tuning profile and no override was
    /// supplied. Defaulting never guesses.
    #[error("unsupported target kind `{kind}`: no default tuning profile")]
    UnsupportedTarget { kind: String },

    /// Whole-model extraction produced a task with other than exactly one
    /// dispatched module; multi-candidate dispatch is not supported.
    #[error("task `{task_name}` has {count} dispatched modules; exactly one is supported")]
    MultiDispatchUnsupported { task_name: String, count: usize },

    /// Failure surfaced by an external collaborator (builder, runner,
    /// database, scheduler, extractor).
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

pub type TuneResult<T> = std::result::Result<T, TuneError>;
