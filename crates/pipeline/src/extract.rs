//! Model-to-task extraction seam.

use anyhow::Result;
use tuneforge_ir::{ModelProgram, ParamMap, ProgramModule, Target};

/// One tuning task lifted out of a model. `dispatched` holds the candidate
/// modules for this task; the pipeline supports exactly one.
#[derive(Clone)]
pub struct ExtractedTask {
    pub task_name: String,
    pub dispatched: Vec<ProgramModule>,
}

/// Splits a model into independent tuning tasks. The default walks the
/// tensor graph node by node; an override can fuse, filter, or reorder.
pub trait TaskExtractor: Send + Sync {
    fn extract(
        &self,
        model: &ModelProgram,
        target: &Target,
        params: Option<&ParamMap>,
    ) -> Result<Vec<ExtractedTask>>;
}

/// One task per graph node, in graph order.
pub struct GraphExtractor;

impl TaskExtractor for GraphExtractor {
    fn extract(
        &self,
        model: &ModelProgram,
        _target: &Target,
        _params: Option<&ParamMap>,
    ) -> Result<Vec<ExtractedTask>> {
        Ok(model
            .nodes
            .iter()
            .map(|node| ExtractedTask {
                task_name: node.task_name.clone(),
                dispatched: vec![ProgramModule::single(node.unit.clone())],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuneforge_ir::{tensor, DataType, ModelProgram, UnitBuilder};

    #[test]
    fn test_one_task_per_node() {
        let unit = UnitBuilder::new()
            .matmul(
                "mm",
                tensor("a", &[16, 16], DataType::F32),
                tensor("b", &[16, 16], DataType::F32),
                tensor("c", &[16, 16], DataType::F32),
            )
            .build();
        let model = ModelProgram::new("net")
            .with_node("dense_0", unit.clone())
            .with_node("dense_1", unit);
        let target = Target::parse("llvm").unwrap();
        let tasks = GraphExtractor.extract(&model, &target, None).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_name, "dense_0");
        assert_eq!(tasks[1].dispatched.len(), 1);
    }
}
