//! Device offload advice
//!
//! Before a kernel runs, the dispatch layer asks an [`OffloadAdvisor`]
//! whether the work would be better placed on an accelerator. No device
//! backend ships with this crate, so a positive answer is only logged and
//! the CPU path runs either way.

use crate::constants::DEVICE_WORK_PER_GPU;
use crate::matrix::{Element, Format, SparseMatrix, TypeDesc};
use crate::ops::OpSignature;

/// What an advisor gets to know about an operand
#[derive(Debug, Clone, PartialEq)]
pub struct OperandSummary {
    pub nnz: usize,
    /// Vectors that may hold entries
    pub nvec: usize,
    pub format: Format,
    pub type_desc: TypeDesc,
}

impl OperandSummary {
    pub fn of<T: Element>(m: &SparseMatrix<T>) -> Self {
        Self {
            nnz: m.nvals(),
            nvec: m.nvec(),
            format: m.format(),
            type_desc: m.type_desc(),
        }
    }

    /// Mean entries per vector
    pub fn avg_degree(&self) -> f64 {
        self.nnz as f64 / self.nvec.max(1) as f64
    }
}

/// Estimated work of a masked operation: every mask entry costs the
/// smaller of the two operands' average vector degrees. Without a mask, A
/// stands in for it; without B, A's degree is used alone.
pub fn offload_work(mask: Option<&OperandSummary>, a: &OperandSummary, b: Option<&OperandSummary>) -> f64 {
    let entries = mask.unwrap_or(a).nnz as f64;
    let degree = match b {
        Some(b) => a.avg_degree().min(b.avg_degree()),
        None => a.avg_degree(),
    };
    entries * degree
}

/// Decides whether a call should run on an accelerator
pub trait OffloadAdvisor: Send + Sync {
    fn should_use_accelerator(
        &self,
        mask: Option<&OperandSummary>,
        a: &OperandSummary,
        b: Option<&OperandSummary>,
        ops: &[OpSignature],
        flipxy: bool,
    ) -> bool;
}

/// Advises offload when the estimated work fills every available device
#[derive(Debug, Clone)]
pub struct CostModelAdvisor {
    /// Accelerators present; 0 means the advisor always declines
    pub n_devices: usize,
    pub work_per_device: f64,
}

impl Default for CostModelAdvisor {
    fn default() -> Self {
        Self {
            n_devices: 0,
            work_per_device: DEVICE_WORK_PER_GPU,
        }
    }
}

impl CostModelAdvisor {
    pub fn with_devices(n_devices: usize) -> Self {
        Self {
            n_devices,
            ..Self::default()
        }
    }
}

impl OffloadAdvisor for CostModelAdvisor {
    fn should_use_accelerator(
        &self,
        mask: Option<&OperandSummary>,
        a: &OperandSummary,
        b: Option<&OperandSummary>,
        ops: &[OpSignature],
        _flipxy: bool,
    ) -> bool {
        if self.n_devices == 0 {
            return false;
        }
        let operands = mask.into_iter().chain(Some(a)).chain(b);
        for op in operands {
            if !op.type_desc.is_builtin() || matches!(op.format, Format::Bitmap | Format::Full) {
                return false;
            }
        }
        if ops.iter().any(|op| !op.is_builtin()) {
            return false;
        }
        offload_work(mask, a, b) >= self.work_per_device * self.n_devices as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{BinaryOpcode, OpSignature};

    fn summary(nnz: usize, nvec: usize, format: Format) -> OperandSummary {
        OperandSummary {
            nnz,
            nvec,
            format,
            type_desc: f64::type_desc(),
        }
    }

    fn plus() -> Vec<OpSignature> {
        vec![OpSignature::builtin(BinaryOpcode::Plus as u8, BinaryOpcode::Plus.name())]
    }

    #[test]
    fn test_work_uses_smaller_degree() {
        let mask = summary(1000, 10, Format::Sparse);
        let a = summary(400, 100, Format::Sparse); // degree 4
        let b = summary(900, 100, Format::Sparse); // degree 9
        assert_eq!(offload_work(Some(&mask), &a, Some(&b)), 4000.0);
        assert_eq!(offload_work(None, &a, None), 1600.0);
    }

    #[test]
    fn test_no_devices_never_offloads() {
        let a = summary(10_000_000, 10, Format::Sparse);
        assert!(!CostModelAdvisor::default().should_use_accelerator(None, &a, None, &plus(), false));
    }

    #[test]
    fn test_large_sparse_work_offloads() {
        let advisor = CostModelAdvisor::with_devices(2);
        let big = summary(4_000_000, 1000, Format::Sparse);
        assert!(advisor.should_use_accelerator(None, &big, Some(&big), &plus(), false));
        let small = summary(1000, 1000, Format::Sparse);
        assert!(!advisor.should_use_accelerator(None, &small, None, &plus(), false));
    }

    #[test]
    fn test_refuses_dense_formats_and_user_types() {
        let advisor = CostModelAdvisor::with_devices(1);
        let big = summary(4_000_000, 1000, Format::Sparse);
        let full = summary(4_000_000, 1000, Format::Full);
        assert!(!advisor.should_use_accelerator(None, &big, Some(&full), &plus(), false));

        let mut user = big.clone();
        user.type_desc = TypeDesc::user("pair", 16, Some("typedef struct { double a, b ; } pair ;"));
        assert!(!advisor.should_use_accelerator(None, &user, None, &plus(), false));

        let user_op = vec![OpSignature::user("myplus", "void myplus (double *z, const double *x, const double *y) { *z = *x + *y ; }")];
        assert!(!advisor.should_use_accelerator(None, &big, None, &user_op, false));
    }
}
