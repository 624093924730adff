//! Selection from bitmap and as-if-full matrices
//!
//! The output is a bitmap over the same positions. Values are copied as they
//! are; only the presence bytes change.

use rayon::prelude::*;

use crate::config::SystemParameters;
use crate::error::Result;
use crate::matrix::{Component, Element, Format, SparseMatrix};
use crate::ops::IndexUnaryOp;
use crate::parallel::plan;
use crate::utils::{try_alloc_filled, try_copy};

pub(crate) fn select_bitmap<T: Element>(
    a: &SparseMatrix<T>,
    op: &IndexUnaryOp<T>,
    flip: bool,
    params: &SystemParameters,
) -> Result<SparseMatrix<T>> {
    let vlen = a.vlen();
    let n = vlen * a.vdim();
    let mut cb = try_alloc_filled(n, 0i8)?;

    let ab = a.b();
    let mark = |j: usize, cb_j: &mut [i8]| -> usize {
        let mut kept = 0;
        for (ii, slot) in cb_j.iter_mut().enumerate() {
            let q = j * vlen + ii;
            if ab.map_or(true, |b| b[q] != 0) {
                let (row, col) = a.coords(ii as i64, j as i64);
                if op.keep(&a.value_at(q), row, col, flip) {
                    *slot = 1;
                    kept += 1;
                }
            }
        }
        kept
    };

    let nvals = if n == 0 {
        0
    } else {
        let (nthreads, _) = plan(n as f64, params);
        if nthreads <= 1 {
            cb.chunks_mut(vlen).enumerate().map(|(j, c)| mark(j, c)).sum()
        } else {
            cb.par_chunks_mut(vlen).enumerate().map(|(j, c)| mark(j, c)).sum()
        }
    };

    let c_iso = a.is_iso() || op.iso_value().is_some();
    let x = if a.is_iso() {
        vec![a.x()[0]]
    } else if let Some(v) = op.iso_value() {
        vec![v]
    } else {
        try_copy(a.x())?
    };

    let (n_rows, n_cols) = a.shape();
    let mut c = SparseMatrix::dense_shell(n_rows, n_cols, a.is_by_row(), Format::Bitmap);
    c.b = Some(Component::owned(cb));
    c.x = Component::owned(x);
    c.nvals_bitmap = nvals;
    c.iso = c_iso;
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_from_full() {
        // column-major 3x3 values 0..9
        let a = SparseMatrix::from_full(3, 3, false, (0..9).map(|v| v as f64).collect()).unwrap();
        let c = select_bitmap(&a, &IndexUnaryOp::Triu(1), false, &SystemParameters::serial()).unwrap();
        assert_eq!(c.format(), Format::Bitmap);
        assert_eq!(c.extract_tuples(), vec![(0, 1, 3.0), (0, 2, 6.0), (1, 2, 7.0)]);
        c.check().unwrap();
    }

    #[test]
    fn test_value_eq_is_iso() {
        let a = SparseMatrix::from_bitmap(2, 2, true, vec![1, 1, 0, 1], vec![5, 3, 0, 5]).unwrap();
        let c = select_bitmap(&a, &IndexUnaryOp::ValueEq(5), false, &SystemParameters::serial()).unwrap();
        assert!(c.is_iso());
        assert_eq!(c.nvals(), 2);
        assert_eq!(c.extract_tuples(), vec![(0, 0, 5), (1, 1, 5)]);
    }
}
