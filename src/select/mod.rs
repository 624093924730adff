//! # Selector engine
//!
//! `C = select(A)` keeps the entries of `A` for which an index-unary
//! predicate holds. Four strategies are tried in order:
//!
//! 1. **Iso**: `A` is iso and the predicate reads only values, so one test
//!    decides the whole matrix.
//! 2. **Bitmap**: `A` is bitmap or as-if-full. The output is a bitmap with
//!    the same values and a thinned presence array.
//! 3. **Vector range**: the predicate keeps or drops whole vectors, so the
//!    output is a contiguous slice (or two) of `A`'s arrays.
//! 4. **General**: entries are counted per task, the counts become offsets,
//!    and each task writes its survivors into its own region of the output.
//!
//! The selection can also run in place, replacing `A`'s content. Removing
//! zombies while finishing pending work is an in-place select.

mod bitmap;
mod column;
mod finalize;
mod general;

use std::borrow::Cow;

use crate::config::SystemParameters;
use crate::error::Result;
use crate::matrix::{Element, Format, SparseMatrix};
use crate::ops::IndexUnaryOp;

/// Strategy a selection runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectPath {
    Iso,
    Bitmap,
    VectorRange,
    General,
}

/// Picks the strategy for selecting from `a` with `op`
pub fn choose_path<T: Element>(op: &IndexUnaryOp<T>, a: &SparseMatrix<T>, in_place: bool) -> SelectPath {
    if a.is_iso() && op.is_value_only() {
        return SelectPath::Iso;
    }
    let nonzombie = matches!(op, IndexUnaryOp::NonZombie);
    if !nonzombie && !in_place {
        let bitmap = a.format() == Format::Bitmap;
        let use_bitmap = if matches!(op, IndexUnaryOp::Diag(_)) {
            bitmap
        } else {
            bitmap || a.as_if_full()
        };
        if use_bitmap {
            return SelectPath::Bitmap;
        }
    }
    if a.format().is_compressed() && op.is_vector_level(a.is_by_row()) {
        return SelectPath::VectorRange;
    }
    SelectPath::General
}

/// Returns a new matrix holding the entries of `a` that satisfy `op`
///
/// `flip` swaps the row and column passed to a user predicate, for callers
/// that hold the transpose of the matrix they mean.
pub fn select<T: Element>(a: &SparseMatrix<T>, op: &IndexUnaryOp<T>, flip: bool) -> Result<SparseMatrix<T>> {
    select_with(a, op, flip, &SystemParameters::default())
}

/// [`select`] with explicit parallel parameters
pub fn select_with<T: Element>(
    a: &SparseMatrix<T>,
    op: &IndexUnaryOp<T>,
    flip: bool,
    params: &SystemParameters,
) -> Result<SparseMatrix<T>> {
    let a = prepare(a, op)?;
    let a = a.as_ref();
    let path = choose_path(op, a, false);
    log::trace!("select {} on {:?} input: {:?} path", op.name(), a.format(), path);

    match path {
        SelectPath::Iso => Ok(select_iso(a, op)),
        SelectPath::Bitmap => bitmap::select_bitmap(a, op, flip, params),
        SelectPath::VectorRange => column::select_vector_range(a, op),
        SelectPath::General => {
            let sparse;
            let a = if a.format().is_compressed() {
                a
            } else {
                sparse = a.to_format(Format::Sparse)?;
                &sparse
            };
            let parts = general::select_general(a, op, flip, params)?;
            finalize::build_result(a, parts)
        }
    }
}

/// Replaces the content of `a` with its entries that satisfy `op`
pub fn select_in_place<T: Element>(a: &mut SparseMatrix<T>, op: &IndexUnaryOp<T>, flip: bool) -> Result<()> {
    select_in_place_with(a, op, flip, &SystemParameters::default())
}

/// [`select_in_place`] with explicit parallel parameters
pub fn select_in_place_with<T: Element>(
    a: &mut SparseMatrix<T>,
    op: &IndexUnaryOp<T>,
    flip: bool,
    params: &SystemParameters,
) -> Result<()> {
    if needs_finishing(a, op) {
        a.wait_with(params)?;
    }
    if !a.format().is_compressed() {
        a.convert_with(Format::Sparse, params)?;
    }
    let path = choose_path(op, a, true);
    log::trace!("select {} in place: {:?} path", op.name(), path);

    match path {
        SelectPath::Iso => {
            let result = select_iso(a, op);
            replace(a, result);
        }
        SelectPath::VectorRange => {
            let result = column::select_vector_range(a, op)?;
            replace(a, result);
        }
        SelectPath::General | SelectPath::Bitmap => {
            let parts = general::select_general(a, op, flip, params)?;
            finalize::splice_result(a, parts)?;
        }
    }
    Ok(())
}

/// Deletes all zombies of `a` in place
pub(crate) fn remove_zombies<T: Element>(a: &mut SparseMatrix<T>, params: &SystemParameters) -> Result<()> {
    if a.nzombies() == 0 {
        return Ok(());
    }
    let parts = general::select_general(a, &IndexUnaryOp::NonZombie, false, params)?;
    finalize::splice_result(a, parts)
}

/// Pending tuples must always be assembled; zombies only matter to
/// predicates other than zombie removal; positional predicates need sorted
/// vectors.
fn needs_finishing<T: Element>(a: &SparseMatrix<T>, op: &IndexUnaryOp<T>) -> bool {
    let nonzombie = matches!(op, IndexUnaryOp::NonZombie);
    a.npending() > 0
        || (a.nzombies() > 0 && !nonzombie)
        || (a.is_jumbled() && op.is_positional() && !op.is_vector_level(a.is_by_row()))
}

fn prepare<'a, T: Element>(a: &'a SparseMatrix<T>, op: &IndexUnaryOp<T>) -> Result<Cow<'a, SparseMatrix<T>>> {
    if needs_finishing(a, op) {
        let mut finished = a.dup();
        finished.wait()?;
        Ok(Cow::Owned(finished))
    } else {
        Ok(Cow::Borrowed(a))
    }
}

fn select_iso<T: Element>(a: &SparseMatrix<T>, op: &IndexUnaryOp<T>) -> SparseMatrix<T> {
    if op.keep(&a.x()[0], 0, 0, false) {
        a.shallow_copy()
    } else {
        a.empty_like()
    }
}

fn replace<T: Element>(a: &mut SparseMatrix<T>, result: SparseMatrix<T>) {
    *a = result;
    a.reclaim();
}
