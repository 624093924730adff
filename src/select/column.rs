//! Selection of whole vectors
//!
//! When a predicate depends only on the vector coordinate (a column of a
//! column-oriented matrix, or a row of a row-oriented one), the survivors
//! are a prefix, a suffix, or everything but one vector of the entry arrays.
//! The output sizes have closed forms and the arrays are bulk copies.

use crate::error::{Error, Result};
use crate::matrix::{Component, Element, SparseMatrix};
use crate::ops::IndexUnaryOp;
use crate::utils::{try_alloc, try_copy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VectorCut {
    /// Drop vector `j`
    Delete,
    /// Keep vectors `<= j`
    UpTo,
    /// Keep vectors `> j`
    After,
}

pub(crate) fn select_vector_range<T: Element>(a: &SparseMatrix<T>, op: &IndexUnaryOp<T>) -> Result<SparseMatrix<T>> {
    let (cut, j) = op_kind(op, a.is_by_row())?;
    let anvec = a.nvec();
    let anz = a.nnz_held();
    let ap = a.p();

    let (k, found) = match a.h() {
        Some(h) => match h.binary_search(&j) {
            Ok(k) => (k, true),
            Err(k) => (k, false),
        },
        None => {
            if j < 0 {
                (0, false)
            } else if j as usize >= a.vdim() {
                (anvec, false)
            } else {
                (j as usize, true)
            }
        }
    };
    let pstart = ap[k] as usize;
    let pend = if found { ap[k + 1] as usize } else { pstart };
    let ajnz = pend - pstart;

    let cnz = match cut {
        VectorCut::Delete => anz - ajnz,
        VectorCut::UpTo => pend,
        VectorCut::After => anz - pend,
    };
    if cnz == anz {
        return Ok(a.shallow_copy());
    }
    if cnz == 0 {
        return Ok(a.empty_like());
    }

    let ai = a.i();
    let (ci, x_range): (Vec<i64>, Vec<std::ops::Range<usize>>) = match cut {
        VectorCut::Delete => (
            concat(&ai[..pstart], &ai[pend..anz])?,
            vec![0..pstart, pend..anz],
        ),
        VectorCut::UpTo => (try_copy(&ai[..pend])?, vec![0..pend]),
        VectorCut::After => (try_copy(&ai[pend..anz])?, vec![pend..anz]),
    };
    let cx = if a.is_iso() {
        vec![a.x()[0]]
    } else {
        let mut cx = try_alloc(cnz)?;
        for r in x_range {
            cx.extend_from_slice(&a.x()[r]);
        }
        cx
    };

    let (cp, ch) = match a.h() {
        Some(ah) => {
            let (cp, ch) = match cut {
                VectorCut::Delete => {
                    let cnvec = anvec - 1;
                    let mut cp = try_alloc(cnvec + 1)?;
                    cp.extend_from_slice(&ap[..k]);
                    cp.extend(ap[k + 1..=anvec].iter().map(|&v| v - ajnz as i64));
                    (cp, concat(&ah[..k], &ah[k + 1..])?)
                }
                VectorCut::UpTo => {
                    let cnvec = if found { k + 1 } else { k };
                    (try_copy(&ap[..=cnvec])?, try_copy(&ah[..cnvec])?)
                }
                VectorCut::After => {
                    let off = if found { k + 1 } else { k };
                    let mut cp = try_alloc(anvec - off + 1)?;
                    cp.extend(ap[off..=anvec].iter().map(|&v| v - pend as i64));
                    (cp, try_copy(&ah[off..])?)
                }
            };
            (cp, Some(ch))
        }
        None => {
            let mut cp = try_alloc(anvec + 1)?;
            match cut {
                VectorCut::Delete => {
                    cp.extend_from_slice(&ap[..=k]);
                    cp.extend(ap[k + 1..=anvec].iter().map(|&v| v - ajnz as i64));
                }
                VectorCut::UpTo => {
                    cp.extend_from_slice(&ap[..=k + 1]);
                    cp.resize(anvec + 1, cnz as i64);
                }
                VectorCut::After => {
                    cp.resize(k + 1, 0);
                    cp.extend(ap[k + 1..=anvec].iter().map(|&v| v - pend as i64));
                }
            }
            (cp, None)
        }
    };

    let mut c = a.empty_like();
    c.format = a.format();
    c.nvec = cp.len() - 1;
    c.p = Component::owned(cp);
    c.h = ch.map(Component::owned);
    c.i = Component::owned(ci);
    c.x = Component::owned(cx);
    c.iso = a.is_iso();
    c.jumbled = a.is_jumbled();
    Ok(c)
}

fn op_kind<T: Element>(op: &IndexUnaryOp<T>, by_row: bool) -> Result<(VectorCut, i64)> {
    let kind = match (op, by_row) {
        (IndexUnaryOp::ColIndex(y), false) | (IndexUnaryOp::RowIndex(y), true) => {
            (VectorCut::Delete, y.wrapping_neg())
        }
        (IndexUnaryOp::ColLe(y), false) | (IndexUnaryOp::RowLe(y), true) => (VectorCut::UpTo, *y),
        (IndexUnaryOp::ColGt(y), false) | (IndexUnaryOp::RowGt(y), true) => (VectorCut::After, *y),
        _ => {
            return Err(Error::Unsupported(format!(
                "'{}' does not select whole vectors",
                op.name()
            )))
        }
    };
    Ok(kind)
}

fn concat<T: Clone>(a: &[T], b: &[T]) -> Result<Vec<T>> {
    let mut v = try_alloc(a.len() + b.len())?;
    v.extend_from_slice(a);
    v.extend_from_slice(b);
    Ok(v)
}
