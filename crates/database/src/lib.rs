//! TuneForge record store.

pub mod db;
pub mod json;
pub mod record;

pub use db::*;
pub use json::*;
pub use record::*;
