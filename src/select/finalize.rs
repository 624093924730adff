//! Turning selection output into a matrix
//!
//! A hypersparse result drops the vectors that lost all their entries; a
//! sparse result keeps every vector.

use super::general::SelectParts;
use crate::error::Result;
use crate::matrix::{Component, Element, Format, SparseMatrix};
use crate::utils::try_alloc;

/// Offsets and hyperlist without empty vectors, or `None` when no vector is
/// empty
fn prune_hyperlist(p: &[i64], h: &[i64]) -> Result<Option<(Vec<i64>, Vec<i64>)>> {
    let nvec = h.len();
    let nonempty = (0..nvec).filter(|&k| p[k + 1] > p[k]).count();
    if nonempty == nvec {
        return Ok(None);
    }
    let mut cp = try_alloc(nonempty + 1)?;
    let mut ch = try_alloc(nonempty)?;
    for k in 0..nvec {
        if p[k + 1] > p[k] {
            cp.push(p[k]);
            ch.push(h[k]);
        }
    }
    cp.push(p[nvec]);
    Ok(Some((cp, ch)))
}

/// A new matrix shaped like `a` holding the selected entries
pub(crate) fn build_result<T: Element>(a: &SparseMatrix<T>, parts: SelectParts<T>) -> Result<SparseMatrix<T>> {
    let SelectParts { p, i, x, iso } = parts;
    let (p, h) = match a.h() {
        Some(ah) => match prune_hyperlist(&p, ah)? {
            Some((cp, ch)) => (cp, Some(ch)),
            None => (p, Some(crate::utils::try_copy(ah)?)),
        },
        None => (p, None),
    };
    let mut c = a.empty_like();
    c.format = if h.is_some() { Format::Hypersparse } else { Format::Sparse };
    c.nvec = p.len() - 1;
    c.p = Component::owned(p);
    c.h = h.map(Component::owned);
    c.i = Component::owned(i);
    c.x = Component::owned(x);
    c.iso = iso;
    c.jumbled = a.is_jumbled();
    Ok(c)
}

/// Replaces the content of `a` with the selected entries. An unchanged
/// hyperlist is kept as it is, shallow or not.
pub(crate) fn splice_result<T: Element>(a: &mut SparseMatrix<T>, parts: SelectParts<T>) -> Result<()> {
    let SelectParts { p, i, x, iso } = parts;
    let pruned = match a.h() {
        Some(ah) => prune_hyperlist(&p, ah)?,
        None => None,
    };
    match pruned {
        Some((cp, ch)) => {
            a.nvec = ch.len();
            a.p = Component::owned(cp);
            a.h = Some(Component::owned(ch));
        }
        None => a.p = Component::owned(p),
    }
    a.i = Component::owned(i);
    a.x = Component::owned(x);
    a.iso = iso;
    a.nzombies = 0;
    a.reclaim();
    Ok(())
}
