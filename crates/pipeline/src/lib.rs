//! TuneForge orchestration pipeline.
//!
//! The driver of the automated kernel-optimization flow: resolve tuning
//! policies per target, extract and deduplicate tuning tasks, hand them to
//! a task scheduler, and assemble the final artifact from the recorded
//! results.
//!
//! Three entry points, one per input shape:
//!
//! - [`tune_unit`]: a single computational unit or program module
//! - [`tune_tensors`]: a tensor-descriptor list, lowered then delegated
//! - [`tune_model`]: a whole model, extracted into independent tasks

#[cfg(feature = "cli")]
pub mod cli;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod extract;
pub mod history;
pub mod policy;

pub use dedup::*;
pub use driver::*;
pub use error::*;
pub use extract::*;
pub use history::*;
pub use policy::*;
