//! # Kernel families
//!
//! Each family computes one kind of operation through [`Context`]:
//!
//! - [`apply`]: `C = f(A)`, C has the pattern of A
//! - [`ewise`]: `C = A ⊕ B` for full A and B
//! - [`rowscale`]: `C = D*B` for a diagonal D
//! - [`reduce`]: `s = ⊕ A(i,j)` with a monoid
//!
//! Every family has a compiled kernel generated from its template and a
//! generic Rust kernel that slices the work the same way. Results that are
//! fully determined by iso inputs are computed directly and never reach a
//! kernel.

pub mod abi;
pub mod apply;
pub mod ewise;
pub mod reduce;
pub mod rowscale;

use std::borrow::Cow;
use std::ffi::c_void;
use std::os::raw::c_int;

pub use abi::{KernelFn, KernelMatrix, MatrixView};

use crate::config::SystemParameters;
use crate::error::{Error, Result};
use crate::jit::{Context, KernelEntry};
use crate::matrix::{Element, SparseMatrix};

/// `a` with zombies removed, pending tuples assembled and vectors sorted.
/// Borrows `a` when there is nothing to finish.
pub(crate) fn finished<'a, T: Element>(
    a: &'a SparseMatrix<T>,
    params: &SystemParameters,
) -> Result<Cow<'a, SparseMatrix<T>>> {
    if a.has_pending_work() {
        let mut a = a.dup();
        a.wait_with(params)?;
        Ok(Cow::Owned(a))
    } else {
        Ok(Cow::Borrowed(a))
    }
}

/// Calls a compiled kernel. `slicing` holds `ntasks + 1` boundaries.
pub(crate) fn call_kernel(
    entry: &KernelEntry,
    c: &mut MatrixView<'_>,
    a: &MatrixView<'_>,
    b: &MatrixView<'_>,
    slicing: &[i64],
    nthreads: usize,
    scalar: *mut c_void,
) -> Result<()> {
    let ntasks = c_int::try_from(slicing.len().saturating_sub(1))
        .map_err(|_| Error::Unsupported("too many tasks for a kernel call".into()))?;
    let nthreads = c_int::try_from(nthreads).unwrap_or(c_int::MAX);
    let kernel = entry.entry();
    // SAFETY: the views borrow live arrays sized as their headers say, and
    // the kernel was validated against the problem these operands encode
    let status = unsafe {
        kernel(
            c.as_mut_ptr(),
            a.as_ptr(),
            b.as_ptr(),
            ntasks,
            nthreads,
            slicing.as_ptr(),
            scalar,
        )
    };
    if status == abi::KERNEL_SUCCESS {
        Ok(())
    } else {
        Err(Error::Unsupported(format!("{} returned status {status}", entry.name)))
    }
}

/// Thread count and position boundaries for `n` independent positions
pub(crate) fn position_plan(n: usize, ctx: &Context) -> (usize, Vec<i64>) {
    let (nthreads, ntasks) = crate::parallel::plan(n as f64, &ctx.params);
    (nthreads, crate::slice::split_even(n, ntasks))
}
