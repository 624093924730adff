//! Two-phase selection over sparse and hypersparse matrices
//!
//! Phase one slices the entries with [`ek_slice`] and counts, per task and
//! per vector, the entries that survive. The counts of vectors shared by two
//! tasks are summed, a cumulative sum turns them into output offsets, and a
//! scan of the task totals gives each task the start of its output region.
//! Phase two repeats the walk and writes survivors into those regions.

use std::ops::Range;

use crate::config::SystemParameters;
use crate::constants::VECTOR_OVERHEAD;
use crate::error::Result;
use crate::matrix::{is_zombie, Element, SparseMatrix};
use crate::ops::IndexUnaryOp;
use crate::parallel::{plan, run_regions, run_tasks, split_at_offsets_mut};
use crate::slice::{ek_slice, merge_task_counts, TaskSlice};
use crate::utils::try_alloc_filled;

/// Offsets, indices and values of a selection result, with one offset per
/// vector of the input
pub(crate) struct SelectParts<T> {
    pub p: Vec<i64>,
    pub i: Vec<i64>,
    pub x: Vec<T>,
    pub iso: bool,
}

/// Absolute offsets `[lo, hi)` of the run a positional predicate keeps in
/// one vector, or drops when `complement` is set
#[derive(Debug, Clone, Copy)]
struct KeptRun {
    lo: usize,
    hi: usize,
    complement: bool,
}

impl KeptRun {
    /// Parts of `clip` that survive
    fn segments(&self, clip: Range<usize>) -> [Range<usize>; 2] {
        let inside = clip.start.max(self.lo)..clip.end.min(self.hi);
        let inside = inside.start..inside.end.max(inside.start);
        if self.complement {
            let before = clip.start..clip.end.min(self.lo).max(clip.start);
            let after = clip.start.max(self.hi).min(clip.end)..clip.end;
            [before, after]
        } else {
            [inside, 0..0]
        }
    }
}

struct TaskCounts {
    /// Survivors per vector of the task
    counts: Vec<i64>,
    /// Kept run per vector of the task, positional predicates only
    runs: Vec<KeptRun>,
}

fn kept_run<T: Element>(a: &SparseMatrix<T>, op: &IndexUnaryOp<T>, k: usize) -> Option<KeptRun> {
    let range = op.inner_range(a.is_by_row(), a.vector_of(k))?;
    let vr = a.vector_range(k);
    let (lo, hi) = range.bounds_in(&a.i()[vr.clone()]);
    Some(KeptRun {
        lo: vr.start + lo,
        hi: vr.start + hi,
        complement: range.complement,
    })
}

/// Counts and writes the survivors of `op` in a sparse or hypersparse
/// matrix whose vectors are sorted if the predicate is positional
pub(crate) fn select_general<T: Element>(
    a: &SparseMatrix<T>,
    op: &IndexUnaryOp<T>,
    flip: bool,
    params: &SystemParameters,
) -> Result<SelectParts<T>> {
    let anvec = a.nvec();
    let anz = a.nnz_held();
    let positional = op.is_positional();
    let nonzombie = matches!(op, IndexUnaryOp::NonZombie);

    let c_iso = a.is_iso() || op.iso_value().is_some();
    let iso_value = if a.is_iso() { Some(a.x()[0]) } else { op.iso_value() };

    // the diagonal costs one binary search per vector, everything else
    // touches every entry
    let work = if matches!(op, IndexUnaryOp::Diag(_)) {
        (VECTOR_OVERHEAD * anvec) as f64
    } else {
        (VECTOR_OVERHEAD * anvec + anz) as f64
    };
    let (nthreads, ntasks) = plan(work, params);
    let slices = ek_slice(a.p(), anvec, ntasks);

    let keep_entry = |p: usize, j: i64| -> bool {
        let ii = a.i()[p];
        if nonzombie {
            return !is_zombie(ii);
        }
        let (row, col) = a.coords(ii, j);
        op.keep(&a.value_at(p), row, col, flip)
    };

    // phase 1: count survivors per task and vector
    let phase1: Vec<TaskCounts> = run_tasks(slices.len(), nthreads, |t| {
        let slice: &TaskSlice = &slices[t];
        let mut counts = Vec::with_capacity(slice.kend - slice.kstart);
        let mut runs = Vec::new();
        for k in slice.vectors() {
            let clip = slice.entries_of(k, a.p());
            let count = if positional {
                let run = kept_run(a, op, k).unwrap_or(KeptRun {
                    lo: 0,
                    hi: usize::MAX,
                    complement: false,
                });
                runs.push(run);
                run.segments(clip).iter().map(|s| s.len()).sum::<usize>()
            } else {
                let j = a.vector_of(k);
                clip.filter(|&p| keep_entry(p, j)).count()
            };
            counts.push(count as i64);
        }
        TaskCounts { counts, runs }
    });

    // combine: vectors shared by neighbouring tasks sum their counts
    let task_counts: Vec<&[i64]> = phase1.iter().map(|tc| tc.counts.as_slice()).collect();
    let (cp, cursors) = merge_task_counts(&slices, &task_counts, anvec)?;
    let cnz = cp[anvec] as usize;

    let mut ci = try_alloc_filled(cnz, 0i64)?;
    let mut cx = if c_iso {
        Vec::new()
    } else {
        try_alloc_filled(cnz, T::default())?
    };

    // phase 2: each task writes its survivors into its own region
    {
        let i_regions = split_at_offsets_mut(&mut ci, &cursors);
        let x_regions = if c_iso {
            let mut empty: Vec<&mut [T]> = Vec::with_capacity(slices.len());
            empty.resize_with(slices.len(), Default::default);
            empty
        } else {
            split_at_offsets_mut(&mut cx, &cursors)
        };
        let ai = a.i();
        run_regions(i_regions, x_regions, nthreads, |t, ci_t, cx_t| {
            let slice = &slices[t];
            let mut w = 0usize;
            for (o, k) in slice.vectors().enumerate() {
                let clip = slice.entries_of(k, a.p());
                if positional {
                    for seg in phase1[t].runs[o].segments(clip) {
                        let n = seg.len();
                        ci_t[w..w + n].copy_from_slice(&ai[seg.clone()]);
                        if !c_iso {
                            cx_t[w..w + n].copy_from_slice(&a.x()[seg]);
                        }
                        w += n;
                    }
                } else {
                    let j = a.vector_of(k);
                    for p in clip {
                        if keep_entry(p, j) {
                            ci_t[w] = ai[p];
                            if !c_iso {
                                cx_t[w] = a.x()[p];
                            }
                            w += 1;
                        }
                    }
                }
            }
            debug_assert_eq!(w, ci_t.len());
        });
    }

    let x = match iso_value {
        Some(v) if c_iso => vec![v],
        _ => cx,
    };
    Ok(SelectParts {
        p: cp,
        i: ci,
        x,
        iso: c_iso,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kept_run_segments() {
        let run = KeptRun { lo: 3, hi: 6, complement: false };
        assert_eq!(run.segments(0..10), [3..6, 0..0]);
        assert_eq!(run.segments(4..5), [4..5, 0..0]);
        assert!(run.segments(7..9)[0].is_empty());

        let hole = KeptRun { lo: 3, hi: 6, complement: true };
        assert_eq!(hole.segments(0..10), [0..3, 6..10]);
        assert_eq!(hole.segments(4..8), [4..4, 6..8]);
        assert_eq!(hole.segments(0..2), [0..2, 2..2]);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let n = 40;
        let mut t = Vec::new();
        for j in 0..n {
            for i in 0..n {
                if (i * 7 + j * 3) % 4 != 0 {
                    t.push((i, j, (i as i64) - (j as i64)));
                }
            }
        }
        let a = SparseMatrix::from_triplets(n, n, &t).unwrap();
        let tiny = SystemParameters { n_threads: 4, chunk: 16.0 };
        for op in [
            IndexUnaryOp::Tril(2),
            IndexUnaryOp::Offdiag(0),
            IndexUnaryOp::RowGt(10),
            IndexUnaryOp::ValueLe(0),
        ] {
            let serial = select_general(&a, &op, false, &SystemParameters::serial()).unwrap();
            let par = select_general(&a, &op, false, &tiny).unwrap();
            assert_eq!(serial.p, par.p, "{op:?}");
            assert_eq!(serial.i, par.i, "{op:?}");
            assert_eq!(serial.x, par.x, "{op:?}");
        }
    }
}
