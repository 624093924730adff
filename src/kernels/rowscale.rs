//! `C = D*B` for a diagonal D
//!
//! Row `i` of B is combined with `D(i,i)`, so C has exactly the pattern of
//! B. Work is split into whole vectors of B: by cost for compressed B,
//! evenly for bitmap and full B.

use std::ptr;

use super::{call_kernel, finished, MatrixView};
use crate::constants::VECTOR_OVERHEAD;
use crate::error::{Error, Result};
use crate::jit::{Context, KernelEntry, KernelFamily, Problem, Role};
use crate::matrix::{Element, Format, SparseMatrix};
use crate::offload::OperandSummary;
use crate::ops::BinaryOp;
use crate::parallel::{for_each_region, plan, split_at_offsets_mut};
use crate::slice::{dense_slice, p_slice, TaskSlice};
use crate::utils::try_alloc_filled;

/// `d` as a sparse matrix holding exactly its `n` diagonal entries, one per
/// vector, so that `D(i,i)` is at position `i`
fn diagonal<T: Element>(d: &SparseMatrix<T>, ctx: &Context) -> Result<SparseMatrix<T>> {
    let n = d.nrows();
    if d.ncols() != n {
        return Err(Error::invalid(format!("D must be square, got {:?}", d.shape())));
    }
    let mut d = d.dup();
    d.wait_with(&ctx.params)?;
    d.convert_with(Format::Sparse, &ctx.params)?;
    let diagonal = d.nvals() == n && (0..n).all(|k| d.p()[k] == k as i64 && d.i()[k] == k as i64);
    if !diagonal {
        return Err(Error::invalid(
            "D must be diagonal with every diagonal entry present",
        ));
    }
    Ok(d)
}

fn vector_slices<T: Element>(b: &SparseMatrix<T>, ntasks: usize) -> Vec<TaskSlice> {
    if b.format().is_compressed() {
        p_slice(b.p(), b.nvec(), ntasks, VECTOR_OVERHEAD)
    } else {
        dense_slice(b.vlen(), b.vdim(), ntasks)
    }
}

impl Context {
    /// Returns `D*B` where `op(D(i,i), B(i,j))` combines each entry of B with
    /// the diagonal entry of its row (`op(B(i,j), D(i,i))` with `flipxy`)
    pub fn rowscale<T: Element>(
        &self,
        d: &SparseMatrix<T>,
        b: &SparseMatrix<T>,
        op: &BinaryOp<T>,
        flipxy: bool,
    ) -> Result<SparseMatrix<T>> {
        if d.ncols() != b.nrows() {
            return Err(Error::DimensionMismatch {
                expected: (b.nrows(), b.nrows()),
                got: d.shape(),
            });
        }
        let d = diagonal(d, self)?;
        let b = finished(b, &self.params)?;
        let b = b.as_ref();

        if d.is_iso() && b.is_iso() {
            let f = op.resolve()?;
            let (x, y) = if flipxy { (b.x()[0], d.x()[0]) } else { (d.x()[0], b.x()[0]) };
            return Ok(b.with_values(vec![f(x, y)], true));
        }

        let (nthreads, ntasks) = plan((b.nnz_held() + VECTOR_OVERHEAD * b.nvec()) as f64, &self.params);
        let slices = vector_slices(b, ntasks);
        let problem = Problem::new(KernelFamily::Rowscale)
            .with_op(0, op.signature())
            .with_operand(Role::C, T::type_desc(), b.format(), false)
            .with_operand(Role::A, T::type_desc(), Format::Sparse, d.is_iso())
            .with_operand(Role::B, T::type_desc(), b.format(), b.is_iso())
            .with_flipxy(flipxy);
        let d_summary = OperandSummary::of(&d);
        let b_summary = OperandSummary::of(b);

        let cx = self.dispatch(
            &problem,
            &d_summary,
            Some(&b_summary),
            |entry| rowscale_jit(entry, &d, b, &slices, nthreads),
            || rowscale_generic(&d, b, op, flipxy, &slices, nthreads),
        )?;
        Ok(b.with_values(cx, false))
    }
}

fn rowscale_jit<T: Element>(
    entry: &KernelEntry,
    d: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
    slices: &[TaskSlice],
    nthreads: usize,
) -> Result<Vec<T>> {
    let slicing: Vec<i64> = slices
        .iter()
        .map(|s| s.kstart as i64)
        .chain(slices.last().map(|s| s.kend as i64))
        .collect();
    let mut cx = try_alloc_filled(b.nnz_held(), T::default())?;
    {
        let d_view = MatrixView::input(d);
        let b_view = MatrixView::input(b);
        let mut c_view = MatrixView::output(b, &mut cx);
        call_kernel(entry, &mut c_view, &d_view, &b_view, &slicing, nthreads, ptr::null_mut())?;
    }
    Ok(cx)
}

fn rowscale_generic<T: Element>(
    d: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
    op: &BinaryOp<T>,
    flipxy: bool,
    slices: &[TaskSlice],
    nthreads: usize,
) -> Result<Vec<T>> {
    let f = op.resolve()?;
    let mut cx = try_alloc_filled(b.nnz_held(), T::default())?;
    let offsets: Vec<usize> = slices
        .iter()
        .map(|s| s.pstart)
        .chain(slices.last().map(|s| s.pend))
        .collect();
    let compressed = b.format().is_compressed();
    let bb = b.b();
    for_each_region(split_at_offsets_mut(&mut cx, &offsets), nthreads, |t, region| {
        let slice = &slices[t];
        for k in slice.vectors() {
            let j = b.vector_of(k);
            let range = b.vector_range(k);
            let vstart = range.start;
            for p in range {
                if bb.map_or(false, |bb| bb[p] == 0) {
                    continue;
                }
                let inner = if compressed { b.i()[p] } else { (p - vstart) as i64 };
                let row = if b.is_by_row() { j } else { inner };
                let dii = d.value_at(row as usize);
                let bij = b.value_at(p);
                region[p - slice.pstart] = if flipxy { f(bij, dii) } else { f(dii, bij) };
            }
        }
    });
    Ok(cx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemParameters;
    use crate::matrix::reference_rowscale;
    use crate::ops::BinaryOpcode;

    fn ctx() -> Context {
        Context::generic_only().with_params(SystemParameters {
            n_threads: 4,
            chunk: 1.0,
        })
    }

    fn diag(values: &[i32]) -> SparseMatrix<i32> {
        let n = values.len();
        let triplets: Vec<_> = values.iter().enumerate().map(|(k, &v)| (k, k, v)).collect();
        SparseMatrix::from_triplets(n, n, &triplets).unwrap()
    }

    fn sample_b() -> SparseMatrix<i32> {
        SparseMatrix::from_triplets(
            3,
            4,
            &[(0, 0, 1), (0, 3, 2), (1, 1, 3), (2, 0, 4), (2, 2, 5), (2, 3, 6)],
        )
        .unwrap()
    }

    #[test]
    fn test_rowscale_matches_reference() {
        let d = diag(&[2, -1, 10]);
        let b = sample_b();
        let op = BinaryOp::Builtin(BinaryOpcode::Times);
        let expected = reference_rowscale(&d, &b, &op).unwrap();
        for format in [Format::Sparse, Format::Hypersparse, Format::Bitmap] {
            let bf = b.to_format(format).unwrap();
            let c = ctx().rowscale(&d, &bf, &op, false).unwrap();
            c.check().unwrap();
            assert_eq!(c.extract_tuples(), expected, "{format:?}");
        }
    }

    #[test]
    fn test_rowscale_by_row() {
        let d = diag(&[2, -1, 10]);
        let b = sample_b().to_orientation(true).unwrap();
        let op = BinaryOp::Builtin(BinaryOpcode::Plus);
        let c = ctx().rowscale(&d, &b, &op, false).unwrap();
        assert!(c.is_by_row());
        assert_eq!(c.extract_tuples(), reference_rowscale(&d, &b, &op).unwrap());
    }

    #[test]
    fn test_flipxy() {
        let d = diag(&[2, -1, 10]);
        let b = sample_b();
        let op = BinaryOp::Builtin(BinaryOpcode::Minus);
        let c = ctx().rowscale(&d, &b, &op, true).unwrap();
        assert_eq!(c.get(2, 3), Some(6 - 10));
    }

    #[test]
    fn test_off_diagonal_or_missing_entries_are_rejected() {
        let b = sample_b();
        let op = BinaryOp::Builtin(BinaryOpcode::Times);
        let mut d = diag(&[1, 1, 1]);
        d.set_element(0, 2, 5).unwrap();
        assert!(matches!(ctx().rowscale(&d, &b, &op, false), Err(Error::InvalidMatrix(_))));

        let mut d = diag(&[1, 1, 1]);
        d.remove_element(1, 1).unwrap();
        assert!(matches!(ctx().rowscale(&d, &b, &op, false), Err(Error::InvalidMatrix(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let d = diag(&[1, 1]);
        let op = BinaryOp::Builtin(BinaryOpcode::Times);
        assert!(matches!(
            ctx().rowscale(&d, &sample_b(), &op, false),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
