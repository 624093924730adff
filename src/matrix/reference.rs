//! Reference implementations over extracted tuples
//!
//! These work on the `(row, col, value)` list of a matrix with no regard for
//! storage format, orientation or parallelism. They are the baseline the
//! sliced selector and the kernels are checked against.

use std::collections::BTreeMap;

use super::sparse::SparseMatrix;
use super::types::Element;
use crate::error::Result;
use crate::ops::{BinaryOp, IndexUnaryOp, Monoid, UnaryOp};

pub type Tuples<T> = Vec<(usize, usize, T)>;

/// Entries of `a` kept by `op`, in (row, col) order
pub fn reference_select<T: Element>(a: &SparseMatrix<T>, op: &IndexUnaryOp<T>, flip: bool) -> Tuples<T> {
    a.extract_tuples()
        .into_iter()
        .filter(|(row, col, x)| op.keep(x, *row as i64, *col as i64, flip))
        .collect()
}

/// `op` applied to every entry of `a`
pub fn reference_apply<T: Element>(a: &SparseMatrix<T>, op: &UnaryOp<T>) -> Result<Tuples<T>> {
    let f = op.resolve()?;
    Ok(a.extract_tuples().into_iter().map(|(r, c, x)| (r, c, f(x))).collect())
}

/// Union of the patterns of `a` and `b`; entries present in both are combined
/// with `op`, the others are copied
pub fn reference_ewise_union<T: Element>(
    a: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
    op: &BinaryOp<T>,
) -> Result<Tuples<T>> {
    let f = op.resolve()?;
    let mut accum: BTreeMap<(usize, usize), T> = a.extract_tuples().into_iter().map(|(r, c, x)| ((r, c), x)).collect();
    for (r, c, y) in b.extract_tuples() {
        accum
            .entry((r, c))
            .and_modify(|x| *x = f(*x, y))
            .or_insert(y);
    }
    Ok(accum.into_iter().map(|((r, c), v)| (r, c, v)).collect())
}

/// `d * b` for a diagonal `d`: row `i` of `b` scaled by `d(i,i)` with `op`.
/// Rows whose diagonal entry is absent drop out.
pub fn reference_rowscale<T: Element>(
    d: &SparseMatrix<T>,
    b: &SparseMatrix<T>,
    op: &BinaryOp<T>,
) -> Result<Tuples<T>> {
    let f = op.resolve()?;
    let diag: BTreeMap<usize, T> = d
        .extract_tuples()
        .into_iter()
        .filter(|(r, c, _)| r == c)
        .map(|(r, _, x)| (r, x))
        .collect();
    Ok(b.extract_tuples()
        .into_iter()
        .filter_map(|(r, c, y)| diag.get(&r).map(|&x| (r, c, f(x, y))))
        .collect())
}

/// Every entry of `a` folded into `monoid.identity`, in column-major order
/// for a column-oriented matrix and row-major order otherwise
pub fn reference_reduce<T: Element>(a: &SparseMatrix<T>, monoid: &Monoid<T>) -> Result<T> {
    let f = monoid.op.resolve()?;
    let mut tuples = a.extract_tuples();
    if !a.is_by_row() {
        tuples.sort_by_key(|&(r, c, _)| (c, r));
    }
    let mut acc = monoid.identity;
    for (_, _, x) in tuples {
        if monoid.terminal == Some(acc) {
            break;
        }
        acc = f(acc, x);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::BinaryOpcode;

    #[test]
    fn test_reference_select_tril() {
        let a = SparseMatrix::from_triplets(3, 3, &[(0, 0, 1), (0, 2, 2), (2, 1, 3)]).unwrap();
        let kept = reference_select(&a, &IndexUnaryOp::Tril(0), false);
        assert_eq!(kept, vec![(0, 0, 1), (2, 1, 3)]);
    }

    #[test]
    fn test_reference_ewise_union() {
        let a = SparseMatrix::from_triplets(2, 2, &[(0, 0, 1), (1, 1, 2)]).unwrap();
        let b = SparseMatrix::from_triplets(2, 2, &[(0, 0, 10), (0, 1, 5)]).unwrap();
        let c = reference_ewise_union(&a, &b, &BinaryOp::Builtin(BinaryOpcode::Plus)).unwrap();
        assert_eq!(c, vec![(0, 0, 11), (0, 1, 5), (1, 1, 2)]);
    }

    #[test]
    fn test_reference_reduce_stops_at_terminal() {
        let a = SparseMatrix::from_triplets(1, 3, &[(0, 0, 3i32), (0, 1, 0), (0, 2, 7)]).unwrap();
        let times = Monoid::builtin(BinaryOpcode::Times).unwrap();
        assert_eq!(reference_reduce(&a, &times).unwrap(), 0);
        let plus = Monoid::builtin(BinaryOpcode::Plus).unwrap();
        assert_eq!(reference_reduce(&a, &plus).unwrap(), 10);
    }
}
