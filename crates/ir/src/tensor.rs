//! Lowering a tensor-descriptor list into a single prim unit.
//!
//! This is the adapter rule behind the tensor-graph tuning entry point: the
//! last descriptor is the output, everything before it is an input.

use crate::dialect::{ElementwiseFunc, KernelOp, MatmulOp, TensorSpec};
use crate::module::{PrimUnit, UnitBuilder};
use anyhow::{bail, Result};

/// Build a prim unit from an ordered tensor list.
///
/// Lowering rule, fixed by contract:
/// - `[a (m,k), b (k,n), out (m,n)]` lowers to a single matmul;
/// - `[input, out]` with matching shapes lowers to a relu elementwise op;
/// - anything else is rejected.
pub fn unit_from_tensors(tensors: &[TensorSpec]) -> Result<PrimUnit> {
    match tensors {
        [lhs, rhs, out] => {
            let (m, k) = lhs.dims2();
            let (k2, n) = rhs.dims2();
            let (om, on) = out.dims2();
            if k != k2 || om != m || on != n {
                bail!(
                    "tensor list does not form a matmul: ({m},{k}) x ({k2},{n}) -> ({om},{on})"
                );
            }
            let mut builder = UnitBuilder::new();
            for spec in tensors {
                builder = builder.param(spec.clone());
            }
            Ok(builder
                .matmul("compute", lhs.clone(), rhs.clone(), out.clone())
                .build())
        }
        [input, out] => {
            if input.dims2() != out.dims2() {
                bail!(
                    "elementwise lowering requires matching shapes, got {:?} and {:?}",
                    input.shape,
                    out.shape
                );
            }
            Ok(UnitBuilder::new()
                .param(input.clone())
                .param(out.clone())
                .elementwise("compute", input.clone(), out.clone(), ElementwiseFunc::Relu)
                .build())
        }
        _ => bail!(
            "expected 2 or 3 tensor descriptors, got {}",
            tensors.len()
        ),
    }
}

/// Whether a unit was produced by the matmul branch of the lowering rule.
pub fn is_matmul_unit(unit: &PrimUnit) -> bool {
    matches!(unit.body.as_slice(), [KernelOp::Matmul(MatmulOp { .. })])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{tensor, DataType};

    #[test]
    fn test_matmul_lowering() {
        let unit = unit_from_tensors(&[
            tensor("a", &[8, 16], DataType::F32),
            tensor("b", &[16, 4], DataType::F32),
            tensor("c", &[8, 4], DataType::F32),
        ])
        .unwrap();
        assert!(is_matmul_unit(&unit));
        assert_eq!(unit.params.len(), 3);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = unit_from_tensors(&[
            tensor("a", &[8, 16], DataType::F32),
            tensor("b", &[8, 4], DataType::F32),
            tensor("c", &[8, 4], DataType::F32),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_elementwise_lowering() {
        let unit = unit_from_tensors(&[
            tensor("x", &[8, 8], DataType::F32),
            tensor("y", &[8, 8], DataType::F32),
        ])
        .unwrap();
        assert!(!is_matmul_unit(&unit));
        assert_eq!(unit.body.len(), 1);
    }
}
