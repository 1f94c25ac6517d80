//! Whole-model programs: named graphs of prim units plus parameter bindings.

use crate::module::PrimUnit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameter bindings associated with a model (weights, constants).
pub type ParamMap = HashMap<String, ndarray::Array2<f32>>;

/// One node of a model graph, carrying the unit to tune and the task name it
/// should be reported under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelNode {
    pub task_name: String,
    pub unit: PrimUnit,
}

/// A whole-model program, the input to model-level tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelProgram {
    pub name: String,
    pub nodes: Vec<ModelNode>,
}

impl ModelProgram {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    pub fn with_node<N: Into<String>>(mut self, task_name: N, unit: PrimUnit) -> Self {
        self.nodes.push(ModelNode {
            task_name: task_name.into(),
            unit,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{tensor, DataType};
    use crate::module::UnitBuilder;

    #[test]
    fn test_model_building() {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[4, 4], DataType::F32),
                tensor("b", &[4, 4], DataType::F32),
                tensor("c", &[4, 4], DataType::F32),
            )
            .build();
        let model = ModelProgram::new("demo")
            .with_node("layer0", unit.clone())
            .with_node("layer1", unit);
        assert_eq!(model.len(), 2);
        assert_eq!(model.nodes[0].task_name, "layer0");
    }
}
