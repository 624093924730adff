//! Basic tests for the matrix descriptor: construction, element updates,
//! deferred work and shared components

use sparsejit::{Error, Format, SparseMatrix, TypeCode};

fn sample_csc() -> SparseMatrix<f64> {
    // [ 1.0  0.0  4.0 ]
    // [ 2.0  3.0  0.0 ]
    // [ 0.0  0.0  5.0 ]
    SparseMatrix::from_csc(3, 3, vec![0, 2, 3, 5], vec![0, 1, 1, 0, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap()
}

#[test]
fn test_matrix_creation() {
    let a = sample_csc();
    assert_eq!(a.shape(), (3, 3));
    assert_eq!(a.format(), Format::Sparse);
    assert!(!a.is_by_row());
    assert_eq!(a.nvals(), 5);
    assert_eq!(a.get(0, 2), Some(4.0));
    assert_eq!(a.get(2, 0), None);
    assert_eq!(a.type_desc().code, TypeCode::Fp64);

    let csr = SparseMatrix::from_csr(2, 3, vec![0, 1, 3], vec![2, 0, 1], vec![7, 8, 9]).unwrap();
    assert!(csr.is_by_row());
    assert_eq!((csr.vlen(), csr.vdim()), (3, 2));
    assert_eq!(csr.extract_tuples(), vec![(0, 2, 7), (1, 0, 8), (1, 1, 9)]);
}

#[test]
fn test_invalid_arrays_are_rejected() {
    // unsorted row indices
    let r = SparseMatrix::from_csc(3, 1, vec![0, 2], vec![2, 0], vec![1.0, 2.0]);
    assert!(matches!(r, Err(Error::InvalidMatrix(_))));
    // offsets past the end of the indices
    let r = SparseMatrix::from_csc(3, 1, vec![0, 3], vec![0, 1], vec![1.0, 2.0]);
    assert!(r.is_err());
    // wrong number of offsets
    let r = SparseMatrix::from_csc(3, 2, vec![0, 1], vec![0], vec![1.0]);
    assert!(r.is_err());
}

#[test]
fn test_set_element_defers_insertions() {
    let mut a = sample_csc();
    a.set_element(1, 1, 30.0).unwrap();
    assert_eq!(a.npending(), 0);
    a.set_element(2, 1, 6.0).unwrap();
    a.set_element(2, 1, 7.0).unwrap();
    assert_eq!(a.npending(), 2);
    assert!(a.has_pending_work());
    // visible before the matrix is finished
    assert_eq!(a.get(2, 1), Some(7.0));

    a.wait().unwrap();
    a.check().unwrap();
    assert!(!a.has_pending_work());
    assert_eq!(a.nvals(), 6);
    assert_eq!(a.get(1, 1), Some(30.0));
    assert_eq!(a.get(2, 1), Some(7.0));
}

#[test]
fn test_remove_element_leaves_zombies() {
    let mut a = sample_csc();
    a.remove_element(1, 0).unwrap();
    a.remove_element(1, 0).unwrap();
    a.remove_element(2, 1).unwrap();
    assert_eq!(a.nzombies(), 1);
    assert_eq!(a.nvals(), 4);
    assert_eq!(a.nnz_held(), 5);
    assert_eq!(a.get(1, 0), None);

    // a zombie comes back to life when it is set again
    a.set_element(1, 0, -2.0).unwrap();
    assert_eq!(a.nzombies(), 0);
    assert_eq!(a.get(1, 0), Some(-2.0));

    a.remove_element(0, 2).unwrap();
    a.wait().unwrap();
    a.check().unwrap();
    assert_eq!(a.nnz_held(), 4);
    assert_eq!(a.extract_tuples(), vec![(0, 0, 1.0), (1, 0, -2.0), (1, 1, 3.0), (2, 2, 5.0)]);
}

#[test]
fn test_out_of_bounds() {
    let mut a = sample_csc();
    assert!(matches!(a.set_element(3, 0, 1.0), Err(Error::IndexOutOfBounds { row: 3, .. })));
    assert!(matches!(a.remove_element(0, 5), Err(Error::IndexOutOfBounds { col: 5, .. })));
}

#[test]
fn test_updates_on_dense_formats() {
    let mut full = SparseMatrix::from_full(2, 2, true, vec![1, 2, 3, 4]).unwrap();
    full.set_element(1, 0, 30).unwrap();
    assert_eq!(full.format(), Format::Full);
    assert_eq!(full.get(1, 0), Some(30));

    full.remove_element(0, 1).unwrap();
    assert_eq!(full.format(), Format::Bitmap);
    assert_eq!(full.nvals(), 3);
    assert_eq!(full.get(0, 1), None);
}

#[test]
fn test_iso_matrix_expands_on_a_new_value() {
    let mut a = SparseMatrix::iso_from_csc(3, 2, vec![0, 2, 3], vec![0, 2, 1], 1.5).unwrap();
    assert!(a.is_iso());
    assert_eq!(a.x().len(), 1);
    a.set_element(2, 0, 1.5).unwrap();
    assert!(a.is_iso());

    a.set_element(0, 0, 4.0).unwrap();
    assert!(!a.is_iso());
    assert_eq!(a.extract_tuples(), vec![(0, 0, 4.0), (1, 1, 1.5), (2, 0, 1.5)]);
}

#[test]
fn test_shallow_copy_shares_until_written() {
    let a = sample_csc();
    let mut b = a.shallow_copy();
    assert!(b.is_shallow());
    assert_eq!(b.extract_tuples(), a.extract_tuples());

    b.set_element(0, 0, 100.0).unwrap();
    assert_eq!(b.get(0, 0), Some(100.0));
    assert_eq!(a.get(0, 0), Some(1.0));

    let c = a.dup();
    assert!(!c.is_shallow());
    assert_eq!(c.extract_tuples(), a.extract_tuples());
}

#[test]
fn test_jumbled_vectors_are_sorted_by_wait() {
    let mut a = SparseMatrix::from_triplets(4, 2, &[(3, 0, 1), (0, 0, 2), (2, 1, 3)]).unwrap();
    a.set_jumbled();
    assert!(a.is_jumbled());
    assert_eq!(a.get(3, 0), Some(1));
    a.wait().unwrap();
    assert!(!a.is_jumbled());
    a.check().unwrap();
}

#[test]
fn test_transpose_is_an_involution() {
    let a = sample_csc();
    let t = a.transpose().unwrap();
    assert_eq!(t.get(2, 0), Some(4.0));
    assert_eq!(t.transpose().unwrap().extract_tuples(), a.extract_tuples());
}
