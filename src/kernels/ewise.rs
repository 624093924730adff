//! `C = A ⊕ B` for matrices with every entry present
//!
//! Both operands are brought to full storage in the orientation of A, so
//! position `p` of A, B and C is the same `(row, col)`. `flipxy` computes
//! `B ⊕ A` instead, for operators that are not commutative.

use std::borrow::Cow;
use std::ptr;

use super::{call_kernel, finished, position_plan, MatrixView};
use crate::error::{Error, Result};
use crate::jit::{Context, KernelEntry, KernelFamily, Problem, Role};
use crate::matrix::{Element, Format, SparseMatrix};
use crate::offload::OperandSummary;
use crate::ops::BinaryOp;
use crate::parallel::{for_each_region, split_at_offsets_mut};
use crate::utils::try_alloc_filled;

/// `a` stored as full with the given orientation
fn as_full<'a, T: Element>(a: &'a SparseMatrix<T>, by_row: bool, ctx: &Context) -> Result<Cow<'a, SparseMatrix<T>>> {
    if a.format() == Format::Full && a.is_by_row() == by_row {
        return Ok(Cow::Borrowed(a));
    }
    let a = finished(a, &ctx.params)?;
    if a.nvals() != a.nrows() * a.ncols() {
        return Err(Error::invalid(format!(
            "element-wise operand has {} of {} entries; every entry must be present",
            a.nvals(),
            a.nrows() * a.ncols()
        )));
    }
    let mut full = a.to_orientation(by_row)?;
    full.convert_with(Format::Full, &ctx.params)?;
    Ok(Cow::Owned(full))
}

impl Context {
    /// Returns `op(A(i,j), B(i,j))` for every `(i,j)`, or `op(B(i,j),
    /// A(i,j))` with `flipxy`. Both operands must hold every entry.
    pub fn ewise_full<T: Element>(
        &self,
        a: &SparseMatrix<T>,
        b: &SparseMatrix<T>,
        op: &BinaryOp<T>,
        flipxy: bool,
    ) -> Result<SparseMatrix<T>> {
        if a.shape() != b.shape() {
            return Err(Error::DimensionMismatch {
                expected: a.shape(),
                got: b.shape(),
            });
        }
        let by_row = a.is_by_row();
        let a = as_full(a, by_row, self)?;
        let b = as_full(b, by_row, self)?;
        let (a, b) = (a.as_ref(), b.as_ref());
        let (nrows, ncols) = a.shape();

        if a.is_iso() && b.is_iso() {
            let f = op.resolve()?;
            let (x, y) = if flipxy { (b.x()[0], a.x()[0]) } else { (a.x()[0], b.x()[0]) };
            return Ok(SparseMatrix::iso_full(nrows, ncols, by_row, f(x, y)));
        }

        let n = a.nnz_held();
        let (nthreads, slicing) = position_plan(n, self);
        let problem = Problem::new(KernelFamily::EwiseFull)
            .with_op(0, op.signature())
            .with_operand(Role::C, T::type_desc(), Format::Full, false)
            .with_operand(Role::A, T::type_desc(), Format::Full, a.is_iso())
            .with_operand(Role::B, T::type_desc(), Format::Full, b.is_iso())
            .with_flipxy(flipxy);
        let a_summary = OperandSummary::of(a);
        let b_summary = OperandSummary::of(b);

        let cx = self.dispatch(
            &problem,
            &a_summary,
            Some(&b_summary),
            |entry| ewise_jit(entry, a, b, &slicing, nthreads),
            || ewise_generic(a, b, op, flipxy, &slicing, nthreads),
        )?;
        SparseMatrix::from_full(nrows, ncols, by_row, cx)
    }
}

fn ewise_jit<T: Element>(
    entry: &KernelEntry,
    a: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
    slicing: &[i64],
    nthreads: usize,
) -> Result<Vec<T>> {
    let mut cx = try_alloc_filled(a.nnz_held(), T::default())?;
    {
        let a_view = MatrixView::input(a);
        let b_view = MatrixView::input(b);
        let mut c_view = MatrixView::output(a, &mut cx);
        call_kernel(entry, &mut c_view, &a_view, &b_view, slicing, nthreads, ptr::null_mut())?;
    }
    Ok(cx)
}

fn ewise_generic<T: Element>(
    a: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
    op: &BinaryOp<T>,
    flipxy: bool,
    slicing: &[i64],
    nthreads: usize,
) -> Result<Vec<T>> {
    let f = op.resolve()?;
    let mut cx = try_alloc_filled(a.nnz_held(), T::default())?;
    let offsets: Vec<usize> = slicing.iter().map(|&s| s as usize).collect();
    for_each_region(split_at_offsets_mut(&mut cx, &offsets), nthreads, |t, region| {
        let pstart = offsets[t];
        for (q, z) in region.iter_mut().enumerate() {
            let p = pstart + q;
            let (x, y) = (a.value_at(p), b.value_at(p));
            *z = if flipxy { f(y, x) } else { f(x, y) };
        }
    });
    Ok(cx)
}
