//! The C view of a matrix handed to compiled kernels
//!
//! Mirrors `sjit_matrix` in `sjit_kernel.h`. Arrays a format does not use
//! are passed as null pointers.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::ptr;

use crate::matrix::{Element, SparseMatrix};

/// Layout shared with the generated C code
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KernelMatrix {
    pub vlen: i64,
    pub vdim: i64,
    pub nvec: i64,
    pub nvals: i64,
    /// Values held in `x`
    pub nx: i64,
    pub format: i32,
    pub iso: i32,
    pub jumbled: i32,
    pub by_row: i32,
    pub p: *const i64,
    pub h: *const i64,
    pub i: *const i64,
    pub b: *const i8,
    pub x: *mut c_void,
}

/// `int sjit_kernel (sjit_matrix *C, const sjit_matrix *A,
/// const sjit_matrix *B, int ntasks, int nthreads, const int64_t *slicing,
/// void *scalar)`
pub type KernelFn = unsafe extern "C" fn(
    c: *mut KernelMatrix,
    a: *const KernelMatrix,
    b: *const KernelMatrix,
    ntasks: c_int,
    nthreads: c_int,
    slicing: *const i64,
    scalar: *mut c_void,
) -> c_int;

/// `void sjit_query_version (int *v)`
pub type QueryVersionFn = unsafe extern "C" fn(v: *mut c_int);

/// `const char *sjit_query_defn (int k)` and `sjit_query_monoid`
pub type QueryTextFn = unsafe extern "C" fn(k: c_int) -> *const std::os::raw::c_char;

/// Status returned by a kernel that finished
pub const KERNEL_SUCCESS: c_int = 0;

/// A [`KernelMatrix`] that borrows the arrays of a matrix for `'a`
pub struct MatrixView<'a> {
    raw: KernelMatrix,
    _borrow: PhantomData<&'a ()>,
}

impl<'a> MatrixView<'a> {
    /// Read-only view of `m`
    pub fn input<T: Element>(m: &'a SparseMatrix<T>) -> Self {
        let compressed = m.format().is_compressed();
        let non_empty = |s: &[i64]| if compressed { s.as_ptr() } else { ptr::null() };
        Self {
            raw: KernelMatrix {
                vlen: m.vlen() as i64,
                vdim: m.vdim() as i64,
                nvec: m.nvec() as i64,
                nvals: m.nvals() as i64,
                nx: m.x().len() as i64,
                format: m.format() as i32,
                iso: m.is_iso() as i32,
                jumbled: m.is_jumbled() as i32,
                by_row: m.is_by_row() as i32,
                p: non_empty(m.p()),
                h: m.h().map_or(ptr::null(), <[i64]>::as_ptr),
                i: non_empty(m.i()),
                b: m.b().map_or(ptr::null(), <[i8]>::as_ptr),
                x: m.x().as_ptr() as *mut c_void,
            },
            _borrow: PhantomData,
        }
    }

    /// View of `m`'s pattern with values written into `x`. The kernel may
    /// only write `x`.
    pub fn output<T: Element>(m: &'a SparseMatrix<T>, x: &'a mut [T]) -> Self {
        let mut view = Self::input(m);
        view.raw.nx = x.len() as i64;
        view.raw.iso = 0;
        view.raw.x = x.as_mut_ptr() as *mut c_void;
        view
    }

    /// An unused operand
    pub fn absent() -> Self {
        Self {
            raw: KernelMatrix {
                vlen: 0,
                vdim: 0,
                nvec: 0,
                nvals: 0,
                nx: 0,
                format: 0,
                iso: 0,
                jumbled: 0,
                by_row: 0,
                p: ptr::null(),
                h: ptr::null(),
                i: ptr::null(),
                b: ptr::null(),
                x: ptr::null_mut(),
            },
            _borrow: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *const KernelMatrix {
        &self.raw
    }

    pub fn as_mut_ptr(&mut self) -> *mut KernelMatrix {
        &mut self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Format;

    #[test]
    fn test_layout_matches_c() {
        // five int64, four int32, five pointers
        assert_eq!(
            std::mem::size_of::<KernelMatrix>(),
            5 * 8 + 4 * 4 + 5 * std::mem::size_of::<*const i64>()
        );
    }

    #[test]
    fn test_unused_arrays_are_null() {
        let full = SparseMatrix::from_full(2, 2, false, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let v = MatrixView::input(&full);
        let raw = unsafe { &*v.as_ptr() };
        assert!(raw.p.is_null() && raw.i.is_null() && raw.h.is_null() && raw.b.is_null());
        assert_eq!(raw.format, Format::Full as i32);
        assert_eq!(raw.nx, 4);

        let sparse = SparseMatrix::from_triplets(2, 2, &[(1, 1, 5i32)]).unwrap();
        let v = MatrixView::input(&sparse);
        let raw = unsafe { &*v.as_ptr() };
        assert!(!raw.p.is_null() && !raw.i.is_null());
        assert_eq!(raw.nvals, 1);
    }
}
