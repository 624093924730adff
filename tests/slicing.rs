//! Coverage properties of the task slicers
//!
//! Whatever the vector sizes and task count, each entry (or each vector)
//! must be owned by exactly one task.

use proptest::prelude::*;
use sparsejit::slice::{dense_slice, ek_slice, p_slice, split_even, task_count};

/// Offsets of a matrix whose vectors hold `counts` entries
fn offsets(counts: &[usize]) -> Vec<i64> {
    let mut p = Vec::with_capacity(counts.len() + 1);
    p.push(0i64);
    for &c in counts {
        p.push(p[p.len() - 1] + c as i64);
    }
    p
}

fn counts_strategy() -> impl Strategy<Value = Vec<usize>> {
    // mostly short vectors with the odd long one
    prop::collection::vec(prop_oneof![4 => 0usize..4, 1 => 20usize..200], 0..40)
}

proptest! {
    #[test]
    fn ek_slice_owns_each_entry_once(counts in counts_strategy(), ntasks in 1usize..40) {
        let p = offsets(&counts);
        let nvec = counts.len();
        let anz = p[nvec] as usize;
        let slices = ek_slice(&p, nvec, ntasks);

        prop_assert!(!slices.is_empty());
        prop_assert!(slices.len() <= ntasks.max(1));
        let mut owner = vec![0usize; anz];
        for s in &slices {
            prop_assert!(s.kstart <= s.kend && s.kend <= nvec);
            for k in s.vectors() {
                for e in s.entries_of(k, &p) {
                    owner[e] += 1;
                }
            }
            // entries of a task live inside its vectors
            for e in s.pstart..s.pend {
                let k = p.partition_point(|&v| v as usize <= e) - 1;
                prop_assert!(s.vectors().contains(&k));
            }
        }
        prop_assert!(owner.iter().all(|&n| n == 1));
        for w in slices.windows(2) {
            prop_assert_eq!(w[0].pend, w[1].pstart);
        }
    }

    #[test]
    fn p_slice_owns_each_vector_once(
        counts in counts_strategy(),
        ntasks in 1usize..40,
        overhead in 0usize..8,
    ) {
        let p = offsets(&counts);
        let nvec = counts.len();
        let slices = p_slice(&p, nvec, ntasks, overhead);

        prop_assert_eq!(slices.len(), ntasks);
        prop_assert_eq!(slices[0].kstart, 0);
        prop_assert_eq!(slices[slices.len() - 1].kend, nvec);
        for w in slices.windows(2) {
            prop_assert_eq!(w[0].kend, w[1].kstart);
        }
        let mut owned = 0usize;
        for s in &slices {
            prop_assert!(s.kstart <= s.kend);
            if nvec > 0 {
                prop_assert_eq!(s.pstart, p[s.kstart] as usize);
                prop_assert_eq!(s.pend, p[s.kend] as usize);
            }
            for k in s.vectors() {
                owned += s.entries_of(k, &p).len();
            }
        }
        prop_assert_eq!(owned, p[nvec] as usize);
    }

    #[test]
    fn dense_slice_covers_every_position(vlen in 0usize..20, vdim in 0usize..30, ntasks in 1usize..40) {
        let slices = dense_slice(vlen, vdim, ntasks);
        prop_assert_eq!(slices[0].pstart, 0);
        prop_assert_eq!(slices[slices.len() - 1].pend, vlen * vdim);
        for w in slices.windows(2) {
            prop_assert_eq!(w[0].kend, w[1].kstart);
            prop_assert_eq!(w[0].pend, w[1].pstart);
        }
    }

    #[test]
    fn split_even_is_balanced(n in 0usize..10_000, ntasks in 1usize..64) {
        let offsets = split_even(n, ntasks);
        prop_assert_eq!(offsets[0], 0);
        prop_assert_eq!(offsets[offsets.len() - 1], n as i64);
        let sizes: Vec<i64> = offsets.windows(2).map(|w| w[1] - w[0]).collect();
        let (lo, hi) = (sizes.iter().min().copied(), sizes.iter().max().copied());
        if let (Some(lo), Some(hi)) = (lo, hi) {
            prop_assert!(hi - lo <= 1);
        }
    }

    #[test]
    fn task_count_respects_thread_limit(work in 0.0f64..1e9, chunk in 1.0f64..1e6, nthreads_max in 1usize..64) {
        let (nthreads, ntasks) = task_count(work, chunk, nthreads_max);
        prop_assert!(nthreads >= 1 && nthreads <= nthreads_max);
        prop_assert!(ntasks >= nthreads);
        if nthreads == 1 {
            prop_assert_eq!(ntasks, 1);
        }
    }
}

#[test]
fn test_one_long_vector_is_shared_by_many_tasks() {
    let p = offsets(&[1, 1000, 1]);
    let slices = ek_slice(&p, 3, 8);
    let sharing = slices.iter().filter(|s| s.vectors().contains(&1)).count();
    assert!(sharing >= 7);

    // the vector slicer cannot split it
    let slices = p_slice(&p, 3, 8, 0);
    let owners = slices.iter().filter(|s| s.vectors().contains(&1)).count();
    assert_eq!(owners, 1);
}
