//! Conversion between storage formats and orientations

use super::sparse::{Format, SparseMatrix};
use super::types::Element;
use super::Component;
use crate::config::SystemParameters;
use crate::error::{Error, Result};
use crate::parallel::{plan, run_tasks};
use crate::slice::{concat_partials, dense_slice, Partial};
use crate::utils::{cumsum_counts, try_alloc, try_alloc_filled};

impl<T: Element> SparseMatrix<T> {
    /// Converts the storage to `format`. Deferred work is finished first.
    pub fn convert(&mut self, format: Format) -> Result<()> {
        self.convert_with(format, &SystemParameters::default())
    }

    /// [`SparseMatrix::convert`] with explicit parallel parameters
    pub fn convert_with(&mut self, format: Format, params: &SystemParameters) -> Result<()> {
        if self.format == format {
            return Ok(());
        }
        if self.has_pending_work() {
            self.wait_with(params)?;
        }
        log::trace!("convert {:?} -> {:?}", self.format, format);
        match format {
            Format::Sparse => self.to_sparse_in_place(params),
            Format::Hypersparse => {
                self.to_sparse_in_place(params)?;
                self.sparse_to_hyper()
            }
            Format::Bitmap => {
                if self.format == Format::Full {
                    self.full_to_bitmap()
                } else {
                    self.to_sparse_in_place(params)?;
                    self.sparse_to_bitmap()
                }
            }
            Format::Full => self.to_full_in_place(),
        }
    }

    /// A copy of `self` stored as `format`
    pub fn to_format(&self, format: Format) -> Result<Self> {
        let mut c = self.dup();
        c.convert(format)?;
        Ok(c)
    }

    fn to_sparse_in_place(&mut self, params: &SystemParameters) -> Result<()> {
        match self.format {
            Format::Sparse => Ok(()),
            Format::Hypersparse => self.hyper_to_sparse(),
            Format::Bitmap | Format::Full => self.dense_to_sparse(params),
        }
    }

    fn hyper_to_sparse(&mut self) -> Result<()> {
        let mut cp = try_alloc_filled(self.vdim + 1, 0i64)?;
        if let Some(h) = self.h.as_ref() {
            for (k, &j) in h.iter().enumerate() {
                cp[j as usize] = self.p[k + 1] - self.p[k];
            }
        }
        cumsum_counts(&mut cp);
        self.p = Component::owned(cp);
        self.h = None;
        self.nvec = self.vdim;
        self.format = Format::Sparse;
        Ok(())
    }

    fn sparse_to_hyper(&mut self) -> Result<()> {
        let nonempty = (0..self.nvec).filter(|&k| self.p[k + 1] > self.p[k]).count();
        let mut cp = try_alloc(nonempty + 1)?;
        let mut ch = try_alloc(nonempty)?;
        for k in 0..self.nvec {
            if self.p[k + 1] > self.p[k] {
                cp.push(self.p[k]);
                ch.push(k as i64);
            }
        }
        cp.push(self.p[self.nvec]);
        self.p = Component::owned(cp);
        self.h = Some(Component::owned(ch));
        self.nvec = nonempty;
        self.format = Format::Hypersparse;
        Ok(())
    }

    /// Each task packs the present entries of a range of vectors; the
    /// partial results are joined in vector order.
    fn dense_to_sparse(&mut self, params: &SystemParameters) -> Result<()> {
        let (vlen, vdim) = (self.vlen, self.vdim);
        let (nthreads, ntasks) = plan((vlen * vdim) as f64, params);
        let slices = dense_slice(vlen, vdim, ntasks);
        let b = self.b.as_deref();
        let iso = self.iso;
        let x: &[T] = &self.x;
        let partials: Vec<Partial<T>> = run_tasks(slices.len(), nthreads, |t| {
            let slice = &slices[t];
            let mut part = Partial::default();
            for k in slice.vectors() {
                let mut count = 0;
                for ii in 0..vlen {
                    let q = k * vlen + ii;
                    if b.map_or(true, |b| b[q] != 0) {
                        part.i.push(ii as i64);
                        if !iso {
                            part.x.push(x[q]);
                        }
                        count += 1;
                    }
                }
                part.counts.push(count);
            }
            part
        });
        let (cp, ci, cx) = concat_partials(&slices, partials, vdim)?;
        self.p = Component::owned(cp);
        self.i = Component::owned(ci);
        if !iso {
            self.x = Component::owned(cx);
        }
        self.b = None;
        self.nvals_bitmap = 0;
        self.nvec = vdim;
        self.format = Format::Sparse;
        Ok(())
    }

    fn sparse_to_bitmap(&mut self) -> Result<()> {
        let n = self.vlen * self.vdim;
        let mut b = try_alloc_filled(n, 0i8)?;
        let mut x = if self.iso {
            Vec::new()
        } else {
            try_alloc_filled(n, T::default())?
        };
        for k in 0..self.nvec {
            let j = self.vector_of(k) as usize;
            for p in self.vector_range(k) {
                let q = j * self.vlen + self.i[p] as usize;
                b[q] = 1;
                if !self.iso {
                    x[q] = self.x[p];
                }
            }
        }
        self.nvals_bitmap = self.nnz_held();
        if !self.iso {
            self.x = Component::owned(x);
        }
        self.b = Some(Component::owned(b));
        self.p = Component::owned(Vec::new());
        self.i = Component::owned(Vec::new());
        self.h = None;
        self.nvec = self.vdim;
        self.format = Format::Bitmap;
        Ok(())
    }

    fn full_to_bitmap(&mut self) -> Result<()> {
        let n = self.vlen * self.vdim;
        self.b = Some(Component::owned(try_alloc_filled(n, 1i8)?));
        self.nvals_bitmap = n;
        self.format = Format::Bitmap;
        Ok(())
    }

    fn to_full_in_place(&mut self) -> Result<()> {
        let all = match self.format {
            Format::Bitmap => self.nvals_bitmap == self.vlen * self.vdim,
            _ => self.as_if_full(),
        };
        if !all {
            return Err(Error::invalid("cannot store as full: some entries are missing"));
        }
        // present entries of an as-if-full matrix are already in position order
        self.p = Component::owned(Vec::new());
        self.i = Component::owned(Vec::new());
        self.h = None;
        self.b = None;
        self.nvals_bitmap = 0;
        self.nvec = self.vdim;
        self.format = Format::Full;
        Ok(())
    }

    /// Arrays of the same matrix stored with the other orientation: one
    /// count per inner index, a cumulative sum, then a scatter in vector order
    /// so every new vector comes out sorted
    fn swapped_storage(&self) -> Result<(Vec<i64>, Vec<i64>, Vec<T>)> {
        let mut counts = try_alloc_filled(self.vlen + 1, 0i64)?;
        for &ii in self.i.iter() {
            counts[ii as usize] += 1;
        }
        cumsum_counts(&mut counts);
        let nnz = self.nnz_held();
        let mut ci = try_alloc_filled(nnz, 0i64)?;
        let mut cx = if self.iso {
            vec![self.x[0]]
        } else {
            try_alloc_filled(nnz, T::default())?
        };
        let mut next = counts.clone();
        for k in 0..self.nvec {
            let j = self.vector_of(k);
            for p in self.vector_range(k) {
                let ii = self.i[p] as usize;
                let pos = next[ii] as usize;
                ci[pos] = j;
                if !self.iso {
                    cx[pos] = self.x[p];
                }
                next[ii] += 1;
            }
        }
        Ok((counts, ci, cx))
    }

    /// The same matrix stored by row (`true`) or by column (`false`)
    pub fn to_orientation(&self, by_row: bool) -> Result<Self> {
        if self.by_row == by_row {
            return Ok(self.dup());
        }
        let mut a = self.dup();
        a.wait()?;
        a.convert(Format::Sparse)?;
        let (cp, ci, cx) = a.swapped_storage()?;
        let mut c = a.empty_like();
        c.by_row = by_row;
        c.vlen = a.vdim;
        c.vdim = a.vlen;
        c.nvec = c.vdim;
        c.p = Component::owned(cp);
        c.i = Component::owned(ci);
        c.x = Component::owned(cx);
        c.iso = a.iso;
        Ok(c)
    }

    /// The transpose, stored with the same orientation as `self`
    pub fn transpose(&self) -> Result<Self> {
        // reading the arrays with the other orientation already gives the
        // transpose; reorienting restores the original layout
        let mut t = self.shallow_copy();
        t.by_row = !self.by_row;
        t.to_orientation(self.by_row)
    }
}
