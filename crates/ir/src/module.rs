//! Prim units, program modules, and input canonicalization.

use crate::dialect::{
    DataType, ElementwiseFunc, ElementwiseOp, KernelOp, LayerNormOp, MatmulOp, ReduceOp, TensorSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical name for the sole entry of a single-unit module.
///
/// Workload lookup compares modules structurally, so a generated module and
/// the module committed at tuning time must agree on the entry name.
pub const MAIN_ENTRY: &str = "main";

/// A single computational unit: parameter tensors plus an ordered op body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PrimUnit {
    pub params: Vec<TensorSpec>,
    pub body: Vec<KernelOp>,
}

impl PrimUnit {
    pub fn op(&self, name: &str) -> Option<&KernelOp> {
        self.body.iter().find(|op| op.name() == name)
    }

    /// The op (if any) that consumes the result of `producer`.
    pub fn consumer_of(&self, producer: &KernelOp) -> Option<&KernelOp> {
        let result = producer.result_name();
        self.body
            .iter()
            .find(|op| op.input_names().contains(&result))
    }
}

/// Builder for a [`PrimUnit`], one method per op kind.
#[derive(Debug, Default, Clone)]
pub struct UnitBuilder {
    params: Vec<TensorSpec>,
    body: Vec<KernelOp>,
}

impl UnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, spec: TensorSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn matmul<N: Into<String>>(
        mut self,
        name: N,
        lhs: TensorSpec,
        rhs: TensorSpec,
        result: TensorSpec,
    ) -> Self {
        self.body.push(KernelOp::Matmul(MatmulOp {
            name: name.into(),
            lhs,
            rhs,
            result,
        }));
        self
    }

    pub fn layer_norm<N: Into<String>>(
        mut self,
        name: N,
        input: TensorSpec,
        result: TensorSpec,
        epsilon: f32,
    ) -> Self {
        self.body.push(KernelOp::LayerNorm(LayerNormOp {
            name: name.into(),
            input,
            result,
            epsilon,
        }));
        self
    }

    pub fn elementwise<N: Into<String>>(
        mut self,
        name: N,
        input: TensorSpec,
        result: TensorSpec,
        func: ElementwiseFunc,
    ) -> Self {
        self.body.push(KernelOp::Elementwise(ElementwiseOp {
            name: name.into(),
            input,
            result,
            func,
        }));
        self
    }

    pub fn reduce<N: Into<String>>(
        mut self,
        name: N,
        input: TensorSpec,
        result: TensorSpec,
        axis: usize,
    ) -> Self {
        self.body.push(KernelOp::Reduce(ReduceOp {
            name: name.into(),
            input,
            result,
            axis,
        }));
        self
    }

    pub fn build(self) -> PrimUnit {
        PrimUnit {
            params: self.params,
            body: self.body,
        }
    }
}

/// A named collection of prim units. Entry order is the map order, which
/// keeps the serialized form canonical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProgramModule {
    pub entries: BTreeMap<String, PrimUnit>,
}

impl ProgramModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Module with `unit` as its sole, canonically named entry.
    pub fn single(unit: PrimUnit) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(MAIN_ENTRY.to_string(), unit);
        Self { entries }
    }

    pub fn with_entry<N: Into<String>>(mut self, name: N, unit: PrimUnit) -> Self {
        self.entries.insert(name.into(), unit);
        self
    }

    pub fn entry(&self, name: &str) -> Option<&PrimUnit> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry contains an op with the given name.
    pub fn has_op(&self, name: &str) -> bool {
        self.entries.values().any(|unit| unit.op(name).is_some())
    }
}

/// The two program shapes the unit-level entry point accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramInput {
    Unit(PrimUnit),
    Module(ProgramModule),
}

impl ProgramInput {
    /// Normalize to a module: a bare unit becomes the sole `main` entry, and
    /// a single-entry module has its entry renamed to `main`. Modules with
    /// more than one entry pass through untouched.
    pub fn into_canonical(self) -> ProgramModule {
        match self {
            ProgramInput::Unit(unit) => ProgramModule::single(unit),
            ProgramInput::Module(module) => canonicalize_module(module),
        }
    }
}

impl From<PrimUnit> for ProgramInput {
    fn from(unit: PrimUnit) -> Self {
        ProgramInput::Unit(unit)
    }
}

impl From<ProgramModule> for ProgramInput {
    fn from(module: ProgramModule) -> Self {
        ProgramInput::Module(module)
    }
}

/// Rename the entry of a single-entry module to [`MAIN_ENTRY`].
pub fn canonicalize_module(mut module: ProgramModule) -> ProgramModule {
    if module.entries.len() == 1 {
        let name = module.entries.keys().next().cloned();
        if let Some(name) = name {
            if name != MAIN_ENTRY {
                if let Some(unit) = module.entries.remove(&name) {
                    module.entries.insert(MAIN_ENTRY.to_string(), unit);
                }
            }
        }
    }
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::tensor;

    fn demo_unit() -> PrimUnit {
        UnitBuilder::new()
            .param(tensor("a", &[4, 8], DataType::F32))
            .param(tensor("b", &[8, 2], DataType::F32))
            .matmul(
                "mm",
                tensor("a", &[4, 8], DataType::F32),
                tensor("b", &[8, 2], DataType::F32),
                tensor("c", &[4, 2], DataType::F32),
            )
            .build()
    }

    #[test]
    fn test_unit_wraps_as_main() {
        let module = ProgramInput::Unit(demo_unit()).into_canonical();
        assert_eq!(module.len(), 1);
        assert!(module.entry(MAIN_ENTRY).is_some());
    }

    #[test]
    fn test_single_entry_renamed() {
        let module = ProgramModule::new().with_entry("my_kernel", demo_unit());
        let module = ProgramInput::Module(module).into_canonical();
        assert!(module.entry("my_kernel").is_none());
        assert!(module.entry(MAIN_ENTRY).is_some());
    }

    #[test]
    fn test_multi_entry_untouched() {
        let module = ProgramModule::new()
            .with_entry("first", demo_unit())
            .with_entry("second", demo_unit());
        let module = ProgramInput::Module(module.clone()).into_canonical();
        assert_eq!(module.len(), 2);
        assert!(module.entry("first").is_some());
    }

    #[test]
    fn test_consumer_lookup() {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[4, 8], DataType::F32),
                tensor("b", &[8, 4], DataType::F32),
                tensor("c", &[4, 4], DataType::F32),
            )
            .elementwise(
                "act",
                tensor("c", &[4, 4], DataType::F32),
                tensor("d", &[4, 4], DataType::F32),
                ElementwiseFunc::Relu,
            )
            .build();
        let mm = unit.op("mm").unwrap();
        assert_eq!(unit.consumer_of(mm).unwrap().name(), "act");
    }
}
