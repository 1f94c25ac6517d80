//! TuneForge tuning collaborators and the measure-and-improve loop.

pub mod builder;
pub mod callback;
pub mod context;
pub mod cost_model;
pub mod exec;
pub mod mutator;
pub mod postproc;
pub mod runner;
pub mod scheduler;
pub mod search;
pub mod space;

pub use builder::*;
pub use callback::*;
pub use context::*;
pub use cost_model::*;
pub use exec::*;
pub use mutator::*;
pub use postproc::*;
pub use runner::*;
pub use scheduler::*;
pub use search::*;
pub use space::*;
