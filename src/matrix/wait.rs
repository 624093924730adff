//! Element updates and deferred work
//!
//! Setting an element that is not yet stored appends a pending tuple;
//! removing one turns it into a zombie. Neither touches the offsets, so a
//! run of updates stays cheap. [`SparseMatrix::wait`] finishes the deferred
//! work: zombies are removed by an in-place select, unsorted vectors are
//! sorted, and pending tuples are merged in with the last write winning.

use std::iter::once;

use super::sparse::{flip, is_zombie, unflip, Format, PendingTuple, SparseMatrix};
use super::types::Element;
use super::Component;
use crate::config::SystemParameters;
use crate::constants::VECTOR_OVERHEAD;
use crate::error::{Error, Result};
use crate::parallel::{plan, run_regions, split_at_offsets_mut};
use crate::slice::p_slice;
use crate::utils::{try_alloc, try_alloc_filled};

impl<T: Element> SparseMatrix<T> {
    fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.nrows() || col >= self.ncols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                nrows: self.nrows(),
                ncols: self.ncols(),
            });
        }
        Ok(())
    }

    /// Expands an iso matrix into one value per held slot
    pub(crate) fn materialize_iso(&mut self) -> Result<()> {
        if !self.iso {
            return Ok(());
        }
        let v = self.x[0];
        self.x = Component::owned(try_alloc_filled(self.nnz_held(), v)?);
        self.iso = false;
        Ok(())
    }

    fn store_value(&mut self, p: usize, value: T) -> Result<()> {
        if self.iso {
            if self.x[0] == value {
                return Ok(());
            }
            self.materialize_iso()?;
        }
        self.x.make_mut()[p] = value;
        Ok(())
    }

    /// Sets `A(row, col) = value`
    pub fn set_element(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        self.check_bounds(row, col)?;
        let (inner, vector) = self.inner_vector(row, col);
        match self.format {
            Format::Full => {
                let q = vector as usize * self.vlen + inner as usize;
                self.store_value(q, value)
            }
            Format::Bitmap => {
                let q = vector as usize * self.vlen + inner as usize;
                if let Some(b) = self.b.as_mut() {
                    let b = b.make_mut();
                    if b[q] == 0 {
                        b[q] = 1;
                        self.nvals_bitmap += 1;
                    }
                }
                self.store_value(q, value)
            }
            Format::Sparse | Format::Hypersparse => match self.find_entry(inner, vector) {
                Some(p) => {
                    let ii = self.i[p];
                    if is_zombie(ii) {
                        self.i.make_mut()[p] = unflip(ii);
                        self.nzombies -= 1;
                    }
                    self.store_value(p, value)
                }
                None => {
                    self.pending.try_reserve(1).map_err(|_| Error::OutOfMemory {
                        size: std::mem::size_of::<PendingTuple<T>>(),
                    })?;
                    self.pending.push(PendingTuple { inner, vector, value });
                    Ok(())
                }
            },
        }
    }

    /// Deletes `A(row, col)` if present
    pub fn remove_element(&mut self, row: usize, col: usize) -> Result<()> {
        self.check_bounds(row, col)?;
        if !self.pending.is_empty() {
            self.wait()?;
        }
        if self.format == Format::Full {
            self.convert(Format::Bitmap)?;
        }
        let (inner, vector) = self.inner_vector(row, col);
        match self.format {
            Format::Bitmap => {
                let q = vector as usize * self.vlen + inner as usize;
                if let Some(b) = self.b.as_mut() {
                    if b[q] != 0 {
                        b.make_mut()[q] = 0;
                        self.nvals_bitmap -= 1;
                    }
                }
            }
            _ => {
                if let Some(p) = self.find_entry(inner, vector) {
                    let ii = self.i[p];
                    if !is_zombie(ii) {
                        self.i.make_mut()[p] = flip(ii);
                        self.nzombies += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Finishes all deferred work
    pub fn wait(&mut self) -> Result<()> {
        self.wait_with(&SystemParameters::default())
    }

    /// [`SparseMatrix::wait`] with explicit parallel parameters
    pub fn wait_with(&mut self, params: &SystemParameters) -> Result<()> {
        if self.nzombies > 0 {
            log::trace!("wait: removing {} zombies", self.nzombies);
            crate::select::remove_zombies(self, params)?;
        }
        if self.jumbled {
            self.unjumble_with(params)?;
        }
        if !self.pending.is_empty() {
            log::trace!("wait: assembling {} pending tuples", self.pending.len());
            self.assemble_pending()?;
        }
        Ok(())
    }

    /// Marks the vectors as possibly unsorted. Selections and kernels that
    /// do not depend on order accept such a matrix; everything else sorts it
    /// first.
    pub fn set_jumbled(&mut self) {
        if self.format.is_compressed() {
            self.jumbled = true;
        }
    }

    /// Sorts every vector by inner index
    pub fn unjumble_with(&mut self, params: &SystemParameters) -> Result<()> {
        if !self.jumbled {
            return Ok(());
        }
        let nvec = self.nvec;
        let anz = self.nnz_held();
        let (nthreads, ntasks) = plan((anz + VECTOR_OVERHEAD * nvec) as f64, params);
        let slices = p_slice(&self.p, nvec, ntasks, VECTOR_OVERHEAD);
        let offsets: Vec<usize> = slices
            .iter()
            .map(|s| s.pstart)
            .chain(once(anz))
            .collect();

        let p: &[i64] = &self.p;
        let iso = self.iso;
        let i_regions = split_at_offsets_mut(self.i.make_mut(), &offsets);
        let x_regions = if iso {
            let mut empty: Vec<&mut [T]> = Vec::with_capacity(slices.len());
            empty.resize_with(slices.len(), Default::default);
            empty
        } else {
            split_at_offsets_mut(self.x.make_mut(), &offsets)
        };
        run_regions(i_regions, x_regions, nthreads, |t, ci, cx| {
            let slice = &slices[t];
            let base = slice.pstart;
            let mut pairs: Vec<(i64, T)> = Vec::new();
            for k in slice.vectors() {
                let lo = p[k] as usize - base;
                let hi = p[k + 1] as usize - base;
                let idx = &mut ci[lo..hi];
                if idx.windows(2).all(|w| unflip(w[0]) < unflip(w[1])) {
                    continue;
                }
                if iso {
                    idx.sort_unstable_by_key(|&ii| unflip(ii));
                } else {
                    pairs.clear();
                    pairs.extend(idx.iter().copied().zip(cx[lo..hi].iter().copied()));
                    pairs.sort_by_key(|&(ii, _)| unflip(ii));
                    for (o, (ii, v)) in pairs.iter().enumerate() {
                        idx[o] = *ii;
                        cx[lo + o] = *v;
                    }
                }
            }
        });
        self.jumbled = false;
        Ok(())
    }

    /// Merges pending tuples into the sorted, zombie-free compressed arrays
    fn assemble_pending(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.pending);
        // stable: equal positions keep insertion order, so the last one wins
        pending.sort_by_key(|t| (t.vector, t.inner));
        let mut tuples: Vec<PendingTuple<T>> = try_alloc(pending.len())?;
        for t in pending {
            match tuples.last_mut() {
                Some(last) if last.vector == t.vector && last.inner == t.inner => *last = t,
                _ => tuples.push(t),
            }
        }

        let stays_iso = self.iso && tuples.iter().all(|t| t.value == self.x[0]);
        if self.iso && !stays_iso {
            self.materialize_iso()?;
        }
        let iso = self.iso;

        let hyper = self.h.is_some();
        let total = self.nnz_held() + tuples.len();
        let mut cp: Vec<i64> = try_alloc(if hyper { self.nvec + tuples.len() + 1 } else { self.vdim + 1 })?;
        let mut ch: Vec<i64> = Vec::new();
        let mut ci: Vec<i64> = try_alloc(total)?;
        let mut cx: Vec<T> = if iso { Vec::new() } else { try_alloc(total)? };
        cp.push(0);

        let mut k = 0; // next existing vector
        let mut t = 0; // next pending tuple
        while k < self.nvec || t < tuples.len() {
            let jk = if k < self.nvec { self.vector_of(k) } else { i64::MAX };
            let jt = if t < tuples.len() { tuples[t].vector } else { i64::MAX };
            let j = jk.min(jt);

            let existing = if jk == j {
                let r = self.vector_range(k);
                k += 1;
                r
            } else {
                0..0
            };
            let tstart = t;
            while t < tuples.len() && tuples[t].vector == j {
                t += 1;
            }
            let incoming = &tuples[tstart..t];

            // merge two sorted runs; on a tie the pending value replaces the old one
            let mut pa = existing.start;
            let mut pb = 0;
            while pa < existing.end || pb < incoming.len() {
                let ia = if pa < existing.end { self.i[pa] } else { i64::MAX };
                let ib = if pb < incoming.len() { incoming[pb].inner } else { i64::MAX };
                if ib <= ia {
                    ci.push(ib);
                    if !iso {
                        cx.push(incoming[pb].value);
                    }
                    pb += 1;
                    if ia == ib {
                        pa += 1;
                    }
                } else {
                    ci.push(ia);
                    if !iso {
                        cx.push(self.x[pa]);
                    }
                    pa += 1;
                }
            }
            if hyper {
                ch.push(j);
            }
            cp.push(ci.len() as i64);
        }
        if !hyper {
            // every vector was visited since the existing list covers all of them
            debug_assert_eq!(cp.len(), self.vdim + 1);
        }

        self.nvec = cp.len() - 1;
        self.p = Component::owned(cp);
        if hyper {
            self.h = Some(Component::owned(ch));
        }
        self.i = Component::owned(ci);
        if !iso {
            self.x = Component::owned(cx);
        }
        Ok(())
    }
}
