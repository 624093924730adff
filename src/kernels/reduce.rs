//! `s = ⊕ A(i,j)`: all entries of a matrix folded with a monoid
//!
//! Positions are split evenly into tasks. Each task folds its positions in
//! storage order starting from the identity and stops at the terminal value;
//! the task results are then folded in task order the same way. The
//! compiled and generic kernels share this partitioning, so they agree even
//! for operators that are not exactly associative, such as floating-point
//! addition.

use std::ffi::c_void;

use super::{call_kernel, finished, position_plan, MatrixView};
use crate::error::Result;
use crate::jit::{Context, KernelEntry, KernelFamily, MonoidText, Problem, Role};
use crate::matrix::{Element, SparseMatrix};
use crate::offload::OperandSummary;
use crate::ops::Monoid;
use crate::parallel::run_tasks;
use crate::utils::try_alloc_filled;

/// Folds `values` into `monoid.identity`, stopping at the terminal value
fn fold<T: Element>(monoid: &Monoid<T>, f: &dyn Fn(T, T) -> T, values: impl Iterator<Item = T>) -> T {
    let mut s = monoid.identity;
    for v in values {
        if monoid.terminal == Some(s) {
            break;
        }
        s = f(s, v);
    }
    s
}

impl Context {
    /// Returns every entry of `a` combined with `monoid`; the identity when
    /// `a` has no entries
    pub fn reduce<T: Element>(&self, a: &SparseMatrix<T>, monoid: &Monoid<T>) -> Result<T> {
        let a = finished(a, &self.params)?;
        let a = a.as_ref();
        let f = monoid.op.resolve()?;
        if a.nvals() == 0 {
            return Ok(monoid.identity);
        }

        let (nthreads, slicing) = position_plan(a.nnz_held(), self);
        let mut problem = Problem::new(KernelFamily::Reduce)
            .with_op(0, monoid.op.signature())
            .with_operand(Role::A, T::type_desc(), a.format(), a.is_iso())
            .with_scalar(T::type_desc());
        if let (Some(identity), Some(terminal)) = (monoid.identity_c(), monoid.terminal_c()) {
            problem = problem.with_monoid(MonoidText { identity, terminal });
        }
        let summary = OperandSummary::of(a);

        let partials = self.dispatch(
            &problem,
            &summary,
            None,
            |entry| reduce_jit(entry, a, monoid, &slicing, nthreads),
            || Ok(reduce_generic(a, monoid, &*f, &slicing, nthreads)),
        )?;
        match partials.as_slice() {
            [s] => Ok(*s),
            _ => Ok(fold(monoid, &*f, partials.into_iter())),
        }
    }
}

fn reduce_jit<T: Element>(
    entry: &KernelEntry,
    a: &SparseMatrix<T>,
    monoid: &Monoid<T>,
    slicing: &[i64],
    nthreads: usize,
) -> Result<Vec<T>> {
    let ntasks = slicing.len() - 1;
    let mut w = try_alloc_filled(ntasks, monoid.identity)?;
    let a_view = MatrixView::input(a);
    call_kernel(
        entry,
        &mut MatrixView::absent(),
        &a_view,
        &MatrixView::absent(),
        slicing,
        nthreads,
        w.as_mut_ptr() as *mut c_void,
    )?;
    Ok(w)
}

fn reduce_generic<T: Element>(
    a: &SparseMatrix<T>,
    monoid: &Monoid<T>,
    f: &(dyn Fn(T, T) -> T + Send + Sync),
    slicing: &[i64],
    nthreads: usize,
) -> Vec<T> {
    let ab = a.b();
    run_tasks(slicing.len() - 1, nthreads, |t| {
        let positions = slicing[t] as usize..slicing[t + 1] as usize;
        fold(
            monoid,
            f,
            positions
                .filter(|&p| ab.map_or(true, |b| b[p] != 0))
                .map(|p| a.value_at(p)),
        )
    })
}
