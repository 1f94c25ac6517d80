//! Structural fingerprints over program modules.
//!
//! The hash is advisory and only used to bucket dedup candidates; equality
//! is authoritative. Hash collisions must never merge distinct programs.

use crate::module::ProgramModule;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Content hash of a module's canonical serialized form.
///
/// Stable within a process, which is all deduplication needs; nothing
/// persists this value.
pub fn structural_hash(module: &ProgramModule) -> u64 {
    let canon = serde_json::to_string(module).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    canon.hash(&mut hasher);
    hasher.finish()
}

/// Exact structural comparison, independent of object identity.
pub fn structural_eq(a: &ProgramModule, b: &ProgramModule) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{tensor, DataType};
    use crate::module::{ProgramModule, UnitBuilder};

    fn matmul_module(m: usize, n: usize, k: usize) -> ProgramModule {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[m, k], DataType::F32),
                tensor("b", &[k, n], DataType::F32),
                tensor("c", &[m, n], DataType::F32),
            )
            .build();
        ProgramModule::single(unit)
    }

    #[test]
    fn test_equal_modules_share_hash() {
        let a = matmul_module(8, 8, 8);
        let b = matmul_module(8, 8, 8);
        assert!(structural_eq(&a, &b));
        assert_eq!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn test_distinct_modules_differ() {
        let a = matmul_module(8, 8, 8);
        let b = matmul_module(16, 8, 8);
        assert!(!structural_eq(&a, &b));
        assert_ne!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn test_entry_name_is_structural() {
        let a = matmul_module(8, 8, 8);
        let unit = a.entry("main").unwrap().clone();
        let b = ProgramModule::new().with_entry("other", unit);
        assert!(!structural_eq(&a, &b));
    }
}
