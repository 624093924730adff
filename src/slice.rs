//! Task slicing of compressed matrices
//!
//! Work on a matrix is divided into tasks in one of two ways:
//!
//! - [`ek_slice`] balances entries. A task owns a contiguous run of entries
//!   and may start or end in the middle of a vector, so neighbouring tasks
//!   can share their boundary vectors.
//! - [`p_slice`] balances whole vectors, charging each vector a fixed
//!   overhead on top of its entries. No vector is split.
//!
//! Two-phase algorithms count per task, combine the counts into offsets with
//! [`merge_task_counts`] and then write each task's output into its own
//! region. One-phase algorithms build a partial result per task and join
//! the partials with [`concat_partials`].

use std::ops::Range;

use crate::constants::TASKS_PER_THREAD;
use crate::error::{Error, Result};
use crate::utils::{cumsum_counts, try_alloc, try_alloc_filled};

/// Vectors and entries owned by one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSlice {
    /// First vector touched
    pub kstart: usize,
    /// One past the last vector touched
    pub kend: usize,
    /// First entry owned
    pub pstart: usize,
    /// One past the last entry owned
    pub pend: usize,
}

impl TaskSlice {
    pub fn vectors(&self) -> Range<usize> {
        self.kstart..self.kend
    }

    /// Entries of vector `k` that belong to this task
    #[inline]
    pub fn entries_of(&self, k: usize, p: &[i64]) -> Range<usize> {
        let lo = (p[k] as usize).max(self.pstart);
        let hi = (p[k + 1] as usize).min(self.pend);
        lo..hi.max(lo)
    }
}

/// Thread and task counts for `work` units of work
///
/// One thread is used per `chunk` units, up to `nthreads_max`. A single
/// thread runs a single task; otherwise each thread gets several tasks so
/// that uneven tasks even out.
pub fn task_count(work: f64, chunk: f64, nthreads_max: usize) -> (usize, usize) {
    let chunk = if chunk > 0.0 { chunk } else { 1.0 };
    let nthreads = (work / chunk).floor();
    let nthreads = (nthreads.max(1.0) as usize).min(nthreads_max.max(1));
    let ntasks = if nthreads == 1 { 1 } else { TASKS_PER_THREAD * nthreads };
    (nthreads, ntasks)
}

/// Index of the vector holding entry `e`
#[inline]
fn vector_holding(p: &[i64], nvec: usize, e: usize) -> usize {
    p[..=nvec].partition_point(|&v| v as usize <= e) - 1
}

/// Divides the entries of a compressed matrix evenly into at most `ntasks`
/// tasks. Every entry belongs to exactly one task; a task's vector range
/// covers the vectors its entries live in.
pub fn ek_slice(p: &[i64], nvec: usize, ntasks: usize) -> Vec<TaskSlice> {
    let anz = if nvec == 0 { 0 } else { p[nvec] as usize };
    if anz == 0 {
        return vec![TaskSlice {
            kstart: 0,
            kend: nvec,
            pstart: 0,
            pend: 0,
        }];
    }
    let ntasks = ntasks.clamp(1, anz);
    let boundary = |t: usize| ((t as u128 * anz as u128) / ntasks as u128) as usize;
    (0..ntasks)
        .map(|t| {
            let pstart = boundary(t);
            let pend = boundary(t + 1);
            TaskSlice {
                kstart: vector_holding(p, nvec, pstart),
                kend: vector_holding(p, nvec, pend - 1) + 1,
                pstart,
                pend,
            }
        })
        .collect()
}

/// Divides the vectors of a compressed matrix into `ntasks` tasks of
/// similar cost, where a vector costs its entries plus `overhead`. Tasks may
/// be empty when a few vectors dominate.
pub fn p_slice(p: &[i64], nvec: usize, ntasks: usize, overhead: usize) -> Vec<TaskSlice> {
    let ntasks = ntasks.max(1);
    let cost = |k: usize| p[k] as u128 + (k * overhead) as u128;
    let total = if nvec == 0 { 0 } else { cost(nvec) };
    let mut bounds = Vec::with_capacity(ntasks + 1);
    bounds.push(0);
    for t in 1..ntasks {
        let target = total * t as u128 / ntasks as u128;
        // first vector whose starting cost reaches the target
        let (mut lo, mut hi) = (0usize, nvec);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if cost(mid) < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        bounds.push(lo.max(*bounds.last().unwrap_or(&0)));
    }
    bounds.push(nvec);
    bounds
        .windows(2)
        .map(|w| TaskSlice {
            kstart: w[0],
            kend: w[1],
            pstart: if nvec == 0 { 0 } else { p[w[0]] as usize },
            pend: if nvec == 0 { 0 } else { p[w[1]] as usize },
        })
        .collect()
}

/// Vector-granular slices of a bitmap or full matrix
pub fn dense_slice(vlen: usize, vdim: usize, ntasks: usize) -> Vec<TaskSlice> {
    let ntasks = ntasks.clamp(1, vdim.max(1));
    (0..ntasks)
        .map(|t| {
            let kstart = t * vdim / ntasks;
            let kend = (t + 1) * vdim / ntasks;
            TaskSlice {
                kstart,
                kend,
                pstart: kstart * vlen,
                pend: kend * vlen,
            }
        })
        .collect()
}

/// Boundaries of `ntasks` nearly equal position ranges over `0..n`, as the
/// `ntasks + 1` offsets handed to position-parallel kernels
pub fn split_even(n: usize, ntasks: usize) -> Vec<i64> {
    let ntasks = ntasks.clamp(1, n.max(1));
    (0..=ntasks)
        .map(|t| ((t as u128 * n as u128) / ntasks as u128) as i64)
        .collect()
}

/// Folds per-task, per-vector counts from entry-balanced `slices` into the
/// output offsets of a matrix with `nvec` vectors. A vector shared by two
/// tasks gets the sum of their counts. Also returns where each task starts
/// writing, with the total as the last cursor.
pub fn merge_task_counts(
    slices: &[TaskSlice],
    task_counts: &[&[i64]],
    nvec: usize,
) -> Result<(Vec<i64>, Vec<usize>)> {
    let mut p = try_alloc_filled(nvec + 1, 0i64)?;
    let mut cursors = try_alloc(slices.len() + 1)?;
    let mut total = 0usize;
    cursors.push(0);
    for (slice, counts) in slices.iter().zip(task_counts) {
        if counts.len() != slice.kend - slice.kstart {
            return Err(Error::invalid("task counts do not match their slice"));
        }
        for (k, &c) in slice.vectors().zip(counts.iter()) {
            p[k] += c;
            total += c as usize;
        }
        cursors.push(total);
    }
    cumsum_counts(&mut p);
    Ok((p, cursors))
}

/// Output of one vector-granular task
#[derive(Debug, Clone, Default)]
pub struct Partial<T> {
    /// Entries of each vector in the task's range
    pub counts: Vec<i64>,
    pub i: Vec<i64>,
    /// Empty when the result is iso
    pub x: Vec<T>,
}

/// Joins per-task partial results over vector-granular `slices` into the
/// offsets, indices and values of a matrix with `nvec` vectors
pub fn concat_partials<T: Clone + Default>(
    slices: &[TaskSlice],
    partials: Vec<Partial<T>>,
    nvec: usize,
) -> Result<(Vec<i64>, Vec<i64>, Vec<T>)> {
    let mut p = try_alloc_filled(nvec + 1, 0i64)?;
    for (slice, part) in slices.iter().zip(&partials) {
        if part.counts.len() != slice.kend - slice.kstart {
            return Err(Error::invalid("partial result does not match its slice"));
        }
        p[slice.vectors()].copy_from_slice(&part.counts);
    }
    cumsum_counts(&mut p);
    let cnz = p[nvec] as usize;
    let xnz: usize = partials.iter().map(|part| part.x.len()).sum();
    let mut ci = try_alloc(cnz)?;
    let mut cx = try_alloc(xnz)?;
    for part in partials {
        ci.extend_from_slice(&part.i);
        cx.extend_from_slice(&part.x);
    }
    if ci.len() != cnz {
        return Err(Error::invalid("partial counts disagree with their indices"));
    }
    Ok((p, ci, cx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_count() {
        assert_eq!(task_count(10.0, 65536.0, 8), (1, 1));
        assert_eq!(task_count(4.0 * 65536.0, 65536.0, 8), (4, 4 * TASKS_PER_THREAD));
        assert_eq!(task_count(1e12, 65536.0, 8), (8, 8 * TASKS_PER_THREAD));
        assert_eq!(task_count(1e12, 65536.0, 0), (1, 1));
    }

    #[test]
    fn test_ek_slice_covers_entries() {
        // vectors: 3, 0, 5, 0, 2 entries
        let p = vec![0, 3, 3, 8, 8, 10];
        for ntasks in 1..=12 {
            let slices = ek_slice(&p, 5, ntasks);
            assert_eq!(slices.first().unwrap().pstart, 0);
            assert_eq!(slices.last().unwrap().pend, 10);
            for w in slices.windows(2) {
                assert_eq!(w[0].pend, w[1].pstart);
                assert!(w[0].kend - 1 <= w[1].kstart);
            }
            let mut seen = 0;
            for s in &slices {
                for k in s.vectors() {
                    seen += s.entries_of(k, &p).len();
                }
            }
            assert_eq!(seen, 10);
        }
    }

    #[test]
    fn test_ek_slice_splits_long_vector() {
        let p = vec![0, 100];
        let slices = ek_slice(&p, 1, 4);
        assert_eq!(slices.len(), 4);
        assert!(slices.iter().all(|s| s.kstart == 0 && s.kend == 1));
        assert_eq!(slices[1].entries_of(0, &p), 25..50);
    }

    #[test]
    fn test_ek_slice_empty() {
        let slices = ek_slice(&[0, 0, 0], 2, 8);
        assert_eq!(slices, vec![TaskSlice { kstart: 0, kend: 2, pstart: 0, pend: 0 }]);
    }

    #[test]
    fn test_p_slice_keeps_vectors_whole() {
        let p = vec![0, 1, 2, 50, 51, 52, 53];
        let slices = p_slice(&p, 6, 3, 0);
        assert_eq!(slices.first().unwrap().kstart, 0);
        assert_eq!(slices.last().unwrap().kend, 6);
        for w in slices.windows(2) {
            assert_eq!(w[0].kend, w[1].kstart);
        }
        for s in &slices {
            assert_eq!(s.pstart, p[s.kstart] as usize);
            assert_eq!(s.pend, p[s.kend] as usize);
        }
    }

    #[test]
    fn test_merge_task_counts_sums_shared_vectors() {
        // task 0 ends inside vector 1, task 1 starts there
        let slices = vec![
            TaskSlice { kstart: 0, kend: 2, pstart: 0, pend: 4 },
            TaskSlice { kstart: 1, kend: 3, pstart: 4, pend: 9 },
        ];
        let counts: Vec<&[i64]> = vec![&[2, 1], &[3, 1]];
        let (p, cursors) = merge_task_counts(&slices, &counts, 3).unwrap();
        assert_eq!(p, vec![0, 2, 6, 7]);
        assert_eq!(cursors, vec![0, 3, 7]);
    }

    #[test]
    fn test_concat_partials() {
        let slices = vec![
            TaskSlice { kstart: 0, kend: 2, pstart: 0, pend: 0 },
            TaskSlice { kstart: 2, kend: 3, pstart: 0, pend: 0 },
        ];
        let partials = vec![
            Partial { counts: vec![1, 0], i: vec![4], x: vec![1.0] },
            Partial { counts: vec![2], i: vec![0, 3], x: vec![2.0, 3.0] },
        ];
        let (p, i, x) = concat_partials(&slices, partials, 3).unwrap();
        assert_eq!(p, vec![0, 1, 1, 3]);
        assert_eq!(i, vec![4, 0, 3]);
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_split_even() {
        assert_eq!(split_even(10, 3), vec![0, 3, 6, 10]);
        assert_eq!(split_even(2, 8), vec![0, 1, 2]);
        assert_eq!(split_even(0, 4), vec![0, 0]);
    }
}
