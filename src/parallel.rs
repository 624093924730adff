//! # Parallel task execution
//!
//! Helpers that run sliced work either serially or on the rayon pool, and
//! that hand each task a disjoint region of a shared output array.

use rayon::prelude::*;

use crate::config::SystemParameters;
use crate::slice::task_count;

/// Thread and task counts for `work` units under `params`
pub fn plan(work: f64, params: &SystemParameters) -> (usize, usize) {
    task_count(work, params.chunk, params.n_threads)
}

/// Runs `f` for every task id and collects the results in task order
///
/// # Arguments
///
/// * `ntasks` - Number of tasks
/// * `nthreads` - Threads the work is worth; 1 runs on the calling thread
/// * `f` - Task body
pub fn run_tasks<R, F>(ntasks: usize, nthreads: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Sync + Send,
{
    if nthreads <= 1 || ntasks <= 1 {
        (0..ntasks).map(f).collect()
    } else {
        (0..ntasks).into_par_iter().map(f).collect()
    }
}

/// Splits `data` into consecutive regions `[offsets[t], offsets[t + 1])`
pub fn split_at_offsets_mut<'a, T>(data: &'a mut [T], offsets: &[usize]) -> Vec<&'a mut [T]> {
    let mut regions = Vec::with_capacity(offsets.len().saturating_sub(1));
    let first = offsets.first().copied().unwrap_or(0);
    let (_, mut rest) = data.split_at_mut(first);
    for w in offsets.windows(2) {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(w[1] - w[0]);
        regions.push(head);
        rest = tail;
    }
    regions
}

/// Runs `f` once per task with that task's region of one output array
pub fn for_each_region<A, F>(regions: Vec<&mut [A]>, nthreads: usize, f: F)
where
    A: Send,
    F: Fn(usize, &mut [A]) + Sync + Send,
{
    if nthreads <= 1 || regions.len() <= 1 {
        regions.into_iter().enumerate().for_each(|(t, r)| f(t, r));
    } else {
        regions.into_par_iter().enumerate().for_each(|(t, r)| f(t, r));
    }
}

/// Runs `f` once per task with that task's regions of two output arrays.
/// Tasks write only their own regions, so no synchronization is needed.
pub fn run_regions<A, B, R, F>(
    a_regions: Vec<&mut [A]>,
    b_regions: Vec<&mut [B]>,
    nthreads: usize,
    f: F,
) -> Vec<R>
where
    A: Send,
    B: Send,
    R: Send,
    F: Fn(usize, &mut [A], &mut [B]) -> R + Sync + Send,
{
    debug_assert_eq!(a_regions.len(), b_regions.len());
    if nthreads <= 1 || a_regions.len() <= 1 {
        a_regions
            .into_iter()
            .zip(b_regions)
            .enumerate()
            .map(|(t, (a, b))| f(t, a, b))
            .collect()
    } else {
        a_regions
            .into_par_iter()
            .zip(b_regions.into_par_iter())
            .enumerate()
            .map(|(t, (a, b))| f(t, a, b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_regions() {
        let mut data = vec![0; 10];
        let regions = split_at_offsets_mut(&mut data, &[0, 3, 3, 7, 10]);
        assert_eq!(regions.iter().map(|r| r.len()).collect::<Vec<_>>(), vec![3, 0, 4, 3]);
    }

    #[test]
    fn test_run_regions_writes_disjointly() {
        let mut ids = vec![0usize; 6];
        let mut vals = vec![0.0f64; 6];
        let offsets = [0, 2, 5, 6];
        let a = split_at_offsets_mut(&mut ids, &offsets);
        let b = split_at_offsets_mut(&mut vals, &offsets);
        let written = run_regions(a, b, 4, |t, ids, vals| {
            for (slot, v) in ids.iter_mut().zip(vals.iter_mut()) {
                *slot = t;
                *v = t as f64 * 0.5;
            }
            ids.len()
        });
        assert_eq!(written, vec![2, 3, 1]);
        assert_eq!(ids, vec![0, 0, 1, 1, 1, 2]);
        assert_eq!(vals[5], 1.0);
    }

    #[test]
    fn test_run_tasks_preserves_order() {
        let out = run_tasks(16, 4, |t| t * t);
        assert_eq!(out, (0..16).map(|t| t * t).collect::<Vec<_>>());
    }
}
