//! Kernel dialect definitions: tensor specs and the ops a unit may contain.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataType {
    F32,
    F16,
    BF16,
}

impl DataType {
    pub fn element_type(&self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F16 => "f16",
            DataType::BF16 => "bf16",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DataType,
}

impl TensorSpec {
    pub fn new<N: Into<String>>(name: N, shape: Vec<usize>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            shape,
            dtype,
        }
    }

    /// Number of elements, treating a scalar spec as one element.
    pub fn len(&self) -> usize {
        self.shape.iter().product::<usize>().max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape as (rows, cols), promoting rank-1 tensors to a single row.
    pub fn dims2(&self) -> (usize, usize) {
        match self.shape.as_slice() {
            [] => (1, 1),
            [n] => (1, *n),
            [r, c, ..] => (*r, *c),
        }
    }
}

/// Convenience constructor mirroring the builder entrypoints.
pub fn tensor<N: Into<String>>(name: N, shape: &[usize], dtype: DataType) -> TensorSpec {
    TensorSpec::new(name, shape.to_vec(), dtype)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ElementwiseFunc {
    #[default]
    Relu,
    Gelu,
    Exp,
}

impl ElementwiseFunc {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementwiseFunc::Relu => "relu",
            ElementwiseFunc::Gelu => "gelu",
            ElementwiseFunc::Exp => "exp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatmulOp {
    pub name: String,
    pub lhs: TensorSpec,
    pub rhs: TensorSpec,
    pub result: TensorSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerNormOp {
    pub name: String,
    pub input: TensorSpec,
    pub result: TensorSpec,
    pub epsilon: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementwiseOp {
    pub name: String,
    pub input: TensorSpec,
    pub result: TensorSpec,
    pub func: ElementwiseFunc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReduceOp {
    pub name: String,
    pub input: TensorSpec,
    pub result: TensorSpec,
    /// Axis being reduced (0 = rows, 1 = cols).
    pub axis: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum KernelOp {
    Matmul(MatmulOp),
    LayerNorm(LayerNormOp),
    Elementwise(ElementwiseOp),
    Reduce(ReduceOp),
}

impl KernelOp {
    pub fn name(&self) -> &str {
        match self {
            KernelOp::Matmul(op) => &op.name,
            KernelOp::LayerNorm(op) => &op.name,
            KernelOp::Elementwise(op) => &op.name,
            KernelOp::Reduce(op) => &op.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            KernelOp::Matmul(_) => "matmul",
            KernelOp::LayerNorm(_) => "layer_norm",
            KernelOp::Elementwise(_) => "elementwise",
            KernelOp::Reduce(_) => "reduce",
        }
    }

    /// Name of the tensor this op produces.
    pub fn result_name(&self) -> &str {
        match self {
            KernelOp::Matmul(op) => &op.result.name,
            KernelOp::LayerNorm(op) => &op.result.name,
            KernelOp::Elementwise(op) => &op.result.name,
            KernelOp::Reduce(op) => &op.result.name,
        }
    }

    /// Names of the tensors this op consumes.
    pub fn input_names(&self) -> Vec<&str> {
        match self {
            KernelOp::Matmul(op) => vec![&op.lhs.name, &op.rhs.name],
            KernelOp::LayerNorm(op) => vec![&op.input.name],
            KernelOp::Elementwise(op) => vec![&op.input.name],
            KernelOp::Reduce(op) => vec![&op.input.name],
        }
    }
}
