//! TuneForge program representation utilities.

pub mod dialect;
pub mod model;
pub mod module;
pub mod structural;
pub mod target;
pub mod tensor;
pub mod trace;

pub use dialect::*;
pub use model::*;
pub use module::*;
pub use structural::*;
pub use target::*;
pub use tensor::*;
pub use trace::*;
