//! Utilities for converting between our matrix formats and external libraries

use ndarray::Array2;
use sprs::CsMat;

use crate::error::{Error, Result};
use crate::matrix::{Element, Format, SparseMatrix};

/// Converts a matrix to a sprs `CsMat`, CSC for a column-oriented matrix
/// and CSR for a row-oriented one
pub fn to_sprs<T: Element>(matrix: &SparseMatrix<T>) -> Result<CsMat<T>> {
    let mut m = matrix.to_format(Format::Sparse)?;
    m.wait()?;
    let shape = m.shape();
    let indptr: Vec<usize> = m.p().iter().map(|&v| v as usize).collect();
    let indices: Vec<usize> = m.i().iter().map(|&v| v as usize).collect();
    let data: Vec<T> = (0..m.nnz_held()).map(|p| m.value_at(p)).collect();
    let built = if m.is_by_row() {
        CsMat::try_new(shape, indptr, indices, data)
    } else {
        CsMat::try_new_csc(shape, indptr, indices, data)
    };
    built.map_err(|(_, _, _, e)| Error::invalid(format!("sprs rejected the arrays: {e:?}")))
}

/// Converts a sprs matrix, keeping its storage orientation
pub fn from_sprs<T: Element>(matrix: CsMat<T>) -> Result<SparseMatrix<T>> {
    let (n_rows, n_cols) = matrix.shape();
    let csc = matrix.is_csc();
    let (indptr, indices, data) = matrix.into_raw_storage();
    let p = indptr.into_iter().map(|v| v as i64).collect();
    let i = indices.into_iter().map(|v| v as i64).collect();
    if csc {
        SparseMatrix::from_csc(n_rows, n_cols, p, i, data)
    } else {
        SparseMatrix::from_csr(n_rows, n_cols, p, i, data)
    }
}

/// Dense copy of a matrix; absent entries read as `T::default()`
pub fn to_dense<T: Element>(matrix: &SparseMatrix<T>) -> Result<Array2<T>> {
    let mut m = matrix.dup();
    m.wait()?;
    let mut dense = Array2::from_elem(m.shape(), T::default());
    for (row, col, x) in m.extract_tuples() {
        dense[[row, col]] = x;
    }
    Ok(dense)
}

/// A full column-oriented matrix holding every value of `dense`
pub fn from_dense<T: Element>(dense: &Array2<T>) -> Result<SparseMatrix<T>> {
    let (n_rows, n_cols) = dense.dim();
    // the transposed view iterates column by column
    let x: Vec<T> = dense.t().iter().copied().collect();
    SparseMatrix::from_full(n_rows, n_cols, false, x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sprs_round_trip() {
        let a = SparseMatrix::from_triplets(3, 2, &[(0, 1, 1.5), (2, 0, -2.0)]).unwrap();
        let s = to_sprs(&a).unwrap();
        assert!(s.is_csc());
        assert_eq!(s.nnz(), 2);
        assert_eq!(s.get(2, 0), Some(&-2.0));
        let back = from_sprs(s).unwrap();
        assert_eq!(back.extract_tuples(), a.extract_tuples());
    }

    #[test]
    fn test_dense_round_trip() {
        let d = array![[1, 2, 3], [4, 5, 6]];
        let m = from_dense(&d).unwrap();
        assert_eq!(m.format(), Format::Full);
        assert_eq!(m.get(1, 0), Some(4));
        assert_eq!(to_dense(&m).unwrap(), d);
    }
}
