//! Index-unary predicates used by the selector
//!
//! A predicate decides per entry whether it survives a select. Positional
//! predicates depend only on the entry's row and column; value predicates
//! compare the entry against a thunk; user predicates see everything.
//!
//! Positional predicates are normalized per vector into an [`InnerRange`]
//! over inner indices, which lets the selector keep a contiguous run of each
//! sorted vector without testing entries one by one. Which index is "inner"
//! depends on the storage orientation.

use std::fmt;
use std::sync::Arc;

use crate::matrix::Element;

/// Closure signature of a user predicate: `(value, row, col, thunk)`
pub type PredicateFn<T> = Arc<dyn Fn(&T, i64, i64, &T) -> bool + Send + Sync>;

/// A predicate defined outside the library
pub struct UserPredicate<T> {
    pub name: String,
    pub defn: String,
    pub func: PredicateFn<T>,
}

impl<T> fmt::Debug for UserPredicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPredicate").field("name", &self.name).finish()
    }
}

/// Select predicate with its thunk
#[derive(Debug, Clone)]
pub enum IndexUnaryOp<T> {
    /// Keep `col - row <= k`
    Tril(i64),
    /// Keep `col - row >= k`
    Triu(i64),
    /// Keep `col - row == k`
    Diag(i64),
    /// Keep `col - row != k`
    Offdiag(i64),
    /// Keep `row + y != 0`
    RowIndex(i64),
    /// Keep `row <= y`
    RowLe(i64),
    /// Keep `row > y`
    RowGt(i64),
    /// Keep `col + y != 0`
    ColIndex(i64),
    /// Keep `col <= y`
    ColLe(i64),
    /// Keep `col > y`
    ColGt(i64),
    ValueEq(T),
    ValueNe(T),
    ValueGt(T),
    ValueGe(T),
    ValueLt(T),
    ValueLe(T),
    /// Drops zombies; only used while finishing pending work
    NonZombie,
    User(Arc<UserPredicate<T>>, T),
}

/// Kept inner indices of one vector: `lo..=hi`, or everything outside it
/// when `complement` is set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerRange {
    pub lo: i64,
    pub hi: i64,
    pub complement: bool,
}

impl InnerRange {
    pub const ALL: InnerRange = InnerRange {
        lo: i64::MIN,
        hi: i64::MAX,
        complement: false,
    };

    pub const NONE: InnerRange = InnerRange {
        lo: i64::MIN,
        hi: i64::MAX,
        complement: true,
    };

    fn between(lo: i64, hi: i64) -> Self {
        Self {
            lo,
            hi,
            complement: false,
        }
    }

    fn except(lo: i64, hi: i64) -> Self {
        Self {
            lo,
            hi,
            complement: true,
        }
    }

    fn all_if(keep: bool) -> Self {
        if keep {
            Self::ALL
        } else {
            Self::NONE
        }
    }

    pub fn contains(&self, i: i64) -> bool {
        (self.lo <= i && i <= self.hi) != self.complement
    }

    /// Offsets `[lo, hi)` of the entries of a sorted index slice that fall
    /// inside `lo..=hi`
    pub fn bounds_in(&self, indices: &[i64]) -> (usize, usize) {
        let lo = indices.partition_point(|&i| i < self.lo);
        let hi = indices.partition_point(|&i| i <= self.hi);
        (lo, hi.max(lo))
    }
}

impl<T: Element> IndexUnaryOp<T> {
    /// Defines a user predicate over `(value, row, col, thunk)`
    pub fn user(
        name: &str,
        defn: &str,
        thunk: T,
        func: impl Fn(&T, i64, i64, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        IndexUnaryOp::User(
            Arc::new(UserPredicate {
                name: name.to_string(),
                defn: defn.to_string(),
                func: Arc::new(func),
            }),
            thunk,
        )
    }

    pub fn name(&self) -> &str {
        match self {
            IndexUnaryOp::Tril(_) => "tril",
            IndexUnaryOp::Triu(_) => "triu",
            IndexUnaryOp::Diag(_) => "diag",
            IndexUnaryOp::Offdiag(_) => "offdiag",
            IndexUnaryOp::RowIndex(_) => "rowindex",
            IndexUnaryOp::RowLe(_) => "rowle",
            IndexUnaryOp::RowGt(_) => "rowgt",
            IndexUnaryOp::ColIndex(_) => "colindex",
            IndexUnaryOp::ColLe(_) => "colle",
            IndexUnaryOp::ColGt(_) => "colgt",
            IndexUnaryOp::ValueEq(_) => "valueeq",
            IndexUnaryOp::ValueNe(_) => "valuene",
            IndexUnaryOp::ValueGt(_) => "valuegt",
            IndexUnaryOp::ValueGe(_) => "valuege",
            IndexUnaryOp::ValueLt(_) => "valuelt",
            IndexUnaryOp::ValueLe(_) => "valuele",
            IndexUnaryOp::NonZombie => "nonzombie",
            IndexUnaryOp::User(op, _) => &op.name,
        }
    }

    /// Depends on the row and column only
    pub fn is_positional(&self) -> bool {
        matches!(
            self,
            IndexUnaryOp::Tril(_)
                | IndexUnaryOp::Triu(_)
                | IndexUnaryOp::Diag(_)
                | IndexUnaryOp::Offdiag(_)
                | IndexUnaryOp::RowIndex(_)
                | IndexUnaryOp::RowLe(_)
                | IndexUnaryOp::RowGt(_)
                | IndexUnaryOp::ColIndex(_)
                | IndexUnaryOp::ColLe(_)
                | IndexUnaryOp::ColGt(_)
        )
    }

    /// Depends on the entry's value only
    pub fn is_value_only(&self) -> bool {
        matches!(
            self,
            IndexUnaryOp::ValueEq(_)
                | IndexUnaryOp::ValueNe(_)
                | IndexUnaryOp::ValueGt(_)
                | IndexUnaryOp::ValueGe(_)
                | IndexUnaryOp::ValueLt(_)
                | IndexUnaryOp::ValueLe(_)
        )
    }

    /// Keeps or drops whole vectors for the given orientation
    pub fn is_vector_level(&self, by_row: bool) -> bool {
        if by_row {
            matches!(
                self,
                IndexUnaryOp::RowIndex(_) | IndexUnaryOp::RowLe(_) | IndexUnaryOp::RowGt(_)
            )
        } else {
            matches!(
                self,
                IndexUnaryOp::ColIndex(_) | IndexUnaryOp::ColLe(_) | IndexUnaryOp::ColGt(_)
            )
        }
    }

    /// Every surviving entry equals this value
    pub fn iso_value(&self) -> Option<T> {
        match self {
            IndexUnaryOp::ValueEq(t) => Some(*t),
            _ => None,
        }
    }

    /// Kept inner indices of the vector at coordinate `vector`, for
    /// positional predicates
    pub fn inner_range(&self, by_row: bool, vector: i64) -> Option<InnerRange> {
        let j = vector;
        let range = if by_row {
            // inner index is the column, vector is the row
            match *self {
                IndexUnaryOp::Tril(k) => InnerRange::between(i64::MIN, j.saturating_add(k)),
                IndexUnaryOp::Triu(k) => InnerRange::between(j.saturating_add(k), i64::MAX),
                IndexUnaryOp::Diag(k) => {
                    let d = j.saturating_add(k);
                    InnerRange::between(d, d)
                }
                IndexUnaryOp::Offdiag(k) => {
                    let d = j.saturating_add(k);
                    InnerRange::except(d, d)
                }
                IndexUnaryOp::RowIndex(y) => InnerRange::all_if(j.wrapping_add(y) != 0),
                IndexUnaryOp::RowLe(y) => InnerRange::all_if(j <= y),
                IndexUnaryOp::RowGt(y) => InnerRange::all_if(j > y),
                IndexUnaryOp::ColIndex(y) => {
                    let c = y.wrapping_neg();
                    InnerRange::except(c, c)
                }
                IndexUnaryOp::ColLe(y) => InnerRange::between(i64::MIN, y),
                IndexUnaryOp::ColGt(y) => InnerRange::between(y.saturating_add(1), i64::MAX),
                _ => return None,
            }
        } else {
            // inner index is the row, vector is the column
            match *self {
                IndexUnaryOp::Tril(k) => InnerRange::between(j.saturating_sub(k), i64::MAX),
                IndexUnaryOp::Triu(k) => InnerRange::between(i64::MIN, j.saturating_sub(k)),
                IndexUnaryOp::Diag(k) => {
                    let d = j.saturating_sub(k);
                    InnerRange::between(d, d)
                }
                IndexUnaryOp::Offdiag(k) => {
                    let d = j.saturating_sub(k);
                    InnerRange::except(d, d)
                }
                IndexUnaryOp::RowIndex(y) => {
                    let r = y.wrapping_neg();
                    InnerRange::except(r, r)
                }
                IndexUnaryOp::RowLe(y) => InnerRange::between(i64::MIN, y),
                IndexUnaryOp::RowGt(y) => InnerRange::between(y.saturating_add(1), i64::MAX),
                IndexUnaryOp::ColIndex(y) => InnerRange::all_if(j.wrapping_add(y) != 0),
                IndexUnaryOp::ColLe(y) => InnerRange::all_if(j <= y),
                IndexUnaryOp::ColGt(y) => InnerRange::all_if(j > y),
                _ => return None,
            }
        };
        Some(range)
    }

    /// Evaluates the predicate on one entry. `flip` swaps the indices passed
    /// to a user predicate; the built-in predicates always see true
    /// coordinates.
    pub fn keep(&self, x: &T, row: i64, col: i64, flip: bool) -> bool {
        match self {
            IndexUnaryOp::Tril(k) => col.wrapping_sub(row) <= *k,
            IndexUnaryOp::Triu(k) => col.wrapping_sub(row) >= *k,
            IndexUnaryOp::Diag(k) => col.wrapping_sub(row) == *k,
            IndexUnaryOp::Offdiag(k) => col.wrapping_sub(row) != *k,
            IndexUnaryOp::RowIndex(y) => row.wrapping_add(*y) != 0,
            IndexUnaryOp::RowLe(y) => row <= *y,
            IndexUnaryOp::RowGt(y) => row > *y,
            IndexUnaryOp::ColIndex(y) => col.wrapping_add(*y) != 0,
            IndexUnaryOp::ColLe(y) => col <= *y,
            IndexUnaryOp::ColGt(y) => col > *y,
            IndexUnaryOp::ValueEq(t) => x == t,
            IndexUnaryOp::ValueNe(t) => x != t,
            IndexUnaryOp::ValueGt(t) => x > t,
            IndexUnaryOp::ValueGe(t) => x >= t,
            IndexUnaryOp::ValueLt(t) => x < t,
            IndexUnaryOp::ValueLe(t) => x <= t,
            IndexUnaryOp::NonZombie => true,
            IndexUnaryOp::User(op, thunk) => {
                if flip {
                    (op.func)(x, col, row, thunk)
                } else {
                    (op.func)(x, row, col, thunk)
                }
            }
        }
    }
}
