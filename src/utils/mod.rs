//! Utility functions and helpers

pub mod formats;

pub use formats::{from_dense, from_sprs, to_dense, to_sprs};

use crate::error::{Error, Result};

/// Replaces per-vector counts `counts[0..n]` with offsets so that
/// `counts[k]` is where vector `k` starts and `counts[n]` is the total.
/// `counts` must have length `n + 1`; its last slot is ignored on input.
/// Returns the number of non-empty vectors.
pub fn cumsum_counts(counts: &mut [i64]) -> usize {
    let mut sum = 0i64;
    let mut nonempty = 0;
    let n = counts.len().saturating_sub(1);
    for c in counts.iter_mut().take(n) {
        let count = *c;
        if count > 0 {
            nonempty += 1;
        }
        *c = sum;
        sum += count;
    }
    if let Some(last) = counts.last_mut() {
        *last = sum;
    }
    nonempty
}

/// Allocates an empty vector with room for `n` values, reporting failure
/// instead of aborting
pub fn try_alloc<T>(n: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| Error::OutOfMemory {
        size: n.saturating_mul(std::mem::size_of::<T>()),
    })?;
    Ok(v)
}

/// Allocates `n` copies of `value`, reporting failure instead of aborting
pub fn try_alloc_filled<T: Clone>(n: usize, value: T) -> Result<Vec<T>> {
    let mut v = try_alloc(n)?;
    v.resize(n, value);
    Ok(v)
}

/// Copies a slice into freshly allocated storage
pub fn try_copy<T: Clone>(src: &[T]) -> Result<Vec<T>> {
    let mut v = try_alloc(src.len())?;
    v.extend_from_slice(src);
    Ok(v)
}
