//! `C = f(A)`: a unary operator applied to every entry
//!
//! C shares the pattern of A and gets new values. Positions are split evenly
//! between tasks; a bitmap position with no entry is left at zero.

use std::ptr;

use super::{call_kernel, finished, position_plan, MatrixView};
use crate::error::Result;
use crate::jit::{Context, KernelEntry, KernelFamily, Problem, Role};
use crate::matrix::{Element, SparseMatrix};
use crate::offload::OperandSummary;
use crate::ops::UnaryOp;
use crate::parallel::{for_each_region, split_at_offsets_mut};
use crate::utils::try_alloc_filled;

impl Context {
    /// Returns `op` applied to every entry of `a`
    pub fn apply<T: Element>(&self, a: &SparseMatrix<T>, op: &UnaryOp<T>) -> Result<SparseMatrix<T>> {
        let a = finished(a, &self.params)?;
        let a = a.as_ref();

        if a.is_iso() {
            let f = op.resolve()?;
            return Ok(a.with_values(vec![f(a.x()[0])], true));
        }

        let n = a.nnz_held();
        let (nthreads, slicing) = position_plan(n, self);
        let problem = Problem::new(KernelFamily::Apply)
            .with_op(0, op.signature())
            .with_operand(Role::C, T::type_desc(), a.format(), false)
            .with_operand(Role::A, T::type_desc(), a.format(), false);
        let summary = OperandSummary::of(a);

        let cx = self.dispatch(
            &problem,
            &summary,
            None,
            |entry| apply_jit(entry, a, &slicing, nthreads),
            || apply_generic(a, op, &slicing, nthreads),
        )?;
        Ok(a.with_values(cx, false))
    }
}

fn apply_jit<T: Element>(
    entry: &KernelEntry,
    a: &SparseMatrix<T>,
    slicing: &[i64],
    nthreads: usize,
) -> Result<Vec<T>> {
    let mut cx = try_alloc_filled(a.nnz_held(), T::default())?;
    {
        let a_view = MatrixView::input(a);
        let mut c_view = MatrixView::output(a, &mut cx);
        call_kernel(
            entry,
            &mut c_view,
            &a_view,
            &MatrixView::absent(),
            slicing,
            nthreads,
            ptr::null_mut(),
        )?;
    }
    Ok(cx)
}

fn apply_generic<T: Element>(
    a: &SparseMatrix<T>,
    op: &UnaryOp<T>,
    slicing: &[i64],
    nthreads: usize,
) -> Result<Vec<T>> {
    let f = op.resolve()?;
    let mut cx = try_alloc_filled(a.nnz_held(), T::default())?;
    let offsets: Vec<usize> = slicing.iter().map(|&s| s as usize).collect();
    let ab = a.b();
    for_each_region(split_at_offsets_mut(&mut cx, &offsets), nthreads, |t, region| {
        let pstart = offsets[t];
        for (q, z) in region.iter_mut().enumerate() {
            let p = pstart + q;
            if ab.map_or(false, |b| b[p] == 0) {
                continue;
            }
            *z = f(a.value_at(p));
        }
    });
    Ok(cx)
}
