//! Integration tests for format conversions, within the descriptor and with
//! external libraries

use ndarray::{array, Array2};
use sparsejit::{from_dense, from_sprs, to_dense, to_sprs, Error, Format, SparseMatrix};

/// Creates a test matrix with a specific pattern:
///
/// ```text
/// [ 1.0  0.0  2.0  0.0  0.0 ]
/// [ 0.0  3.0  0.0  0.0  4.0 ]
/// [ 0.0  0.0  5.0  0.0  0.0 ]
/// [ 6.0  0.0  0.0  7.0  0.0 ]
/// [ 0.0  0.0  8.0  0.0  9.0 ]
/// ```
fn create_test_matrix() -> SparseMatrix<f64> {
    SparseMatrix::from_csr(
        5,
        5,
        vec![0, 2, 4, 5, 7, 9],
        vec![0, 2, 1, 4, 2, 0, 3, 2, 4],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
    )
    .unwrap()
}

/// Creates a tridiagonal matrix stored by column
fn create_tridiagonal(n: usize) -> SparseMatrix<f64> {
    let mut triplets = Vec::new();
    for i in 0..n {
        if i > 0 {
            triplets.push((i, i - 1, 1.0));
        }
        triplets.push((i, i, 2.0));
        if i + 1 < n {
            triplets.push((i, i + 1, 1.0));
        }
    }
    SparseMatrix::from_triplets(n, n, &triplets).unwrap()
}

const FORMATS: [Format; 3] = [Format::Sparse, Format::Hypersparse, Format::Bitmap];

#[test]
fn test_every_conversion_keeps_the_entries() {
    let a = create_test_matrix();
    let expected = a.extract_tuples();
    for from in FORMATS {
        let af = a.to_format(from).unwrap();
        assert_eq!(af.format(), from);
        af.check().unwrap();
        for to in FORMATS {
            let c = af.to_format(to).unwrap();
            c.check().unwrap();
            assert_eq!(c.format(), to);
            assert!(c.is_by_row());
            assert_eq!(c.extract_tuples(), expected, "{from:?} -> {to:?}");
        }
    }
}

#[test]
fn test_hypersparse_keeps_only_nonempty_vectors() {
    let a = SparseMatrix::from_triplets(4, 1000, &[(0, 3, 1), (2, 500, 2), (3, 999, 3)]).unwrap();
    let h = a.to_format(Format::Hypersparse).unwrap();
    assert_eq!(h.nvec(), 3);
    assert_eq!(h.h(), Some(&[3i64, 500, 999][..]));
    assert_eq!(h.get(2, 500), Some(2));
    assert_eq!(h.get(2, 501), None);
}

#[test]
fn test_full_needs_every_entry() {
    let full = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1), (1, 0, 2), (0, 1, 3), (1, 1, 4)]).unwrap();
    let f = full.to_format(Format::Full).unwrap();
    assert_eq!(f.format(), Format::Full);
    assert_eq!(f.x(), &[1, 2, 3, 4]);

    let partial = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1)]).unwrap();
    assert!(matches!(partial.to_format(Format::Full), Err(Error::InvalidMatrix(_))));
}

#[test]
fn test_orientation_and_transpose() {
    let a = create_tridiagonal(6);
    let by_row = a.to_orientation(true).unwrap();
    assert!(by_row.is_by_row());
    assert_eq!(by_row.shape(), (6, 6));
    assert_eq!(by_row.extract_tuples(), a.extract_tuples());

    let b = create_test_matrix();
    let t = b.transpose().unwrap();
    assert_eq!(t.shape(), (5, 5));
    for (row, col, x) in b.extract_tuples() {
        assert_eq!(t.get(col, row), Some(x));
    }
    assert_eq!(t.nvals(), b.nvals());
}

#[test]
fn test_sprs_round_trip_both_orientations() {
    let csr = create_test_matrix();
    let s = to_sprs(&csr).unwrap();
    assert!(s.is_csr());
    assert_eq!(s.nnz(), 9);
    assert_eq!(s.get(3, 3), Some(&7.0));
    assert_eq!(from_sprs(s).unwrap().extract_tuples(), csr.extract_tuples());

    let csc = create_tridiagonal(10);
    let s = to_sprs(&csc).unwrap();
    assert!(s.is_csc());
    assert_eq!(s.nnz(), 28);
    let back = from_sprs(s).unwrap();
    assert!(!back.is_by_row());
    assert_eq!(back.extract_tuples(), csc.extract_tuples());
}

#[test]
fn test_sprs_from_bitmap_and_pending_work() {
    let mut a = create_test_matrix().to_format(Format::Bitmap).unwrap();
    a.set_element(2, 3, 10.0).unwrap();
    let s = to_sprs(&a).unwrap();
    assert_eq!(s.nnz(), 10);
    assert_eq!(s.get(2, 3), Some(&10.0));
}

#[test]
fn test_sprs_operations_agree() {
    let a = create_tridiagonal(8);
    let s = to_sprs(&a).unwrap();
    let doubled = from_sprs(s.map(|x| 2.0 * x)).unwrap();
    for (row, col, x) in a.extract_tuples() {
        assert_eq!(doubled.get(row, col), Some(2.0 * x));
    }
}

#[test]
fn test_dense_round_trip() {
    let d = array![[1.0, 0.0, 2.5], [0.0, -1.0, 0.0]];
    let m = from_dense(&d).unwrap();
    assert_eq!(m.format(), Format::Full);
    assert_eq!(m.nvals(), 6);
    assert_eq!(to_dense(&m).unwrap(), d);

    let sparse = create_test_matrix();
    let dense: Array2<f64> = to_dense(&sparse).unwrap();
    assert_eq!(dense[[4, 4]], 9.0);
    assert_eq!(dense[[4, 3]], 0.0);
    assert_eq!(dense.iter().filter(|&&v| v != 0.0).count(), 9);
}
