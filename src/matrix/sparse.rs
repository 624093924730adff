//! Compressed sparse matrix descriptor
//!
//! A [`SparseMatrix`] stores `vdim` vectors of length `vlen`. With column
//! orientation a vector is a column and the inner index is the row; with
//! row orientation the roles swap. Four storage formats are supported:
//!
//! - **Sparse**: offsets `p` (length `vdim + 1`), inner indices `i`, values `x`
//! - **Hypersparse**: as sparse, plus a hyperlist `h` naming the `nvec`
//!   vectors that are present, so `p` has length `nvec + 1`
//! - **Bitmap**: a presence byte per position in `b`, values in `x`
//! - **Full**: every position present, values in `x`
//!
//! Positions are laid out vector-major: position `q` of a bitmap or full
//! matrix is inner index `q % vlen` of vector `q / vlen`.
//!
//! An iso matrix stores one value shared by every entry. Deleted entries of a
//! sparse or hypersparse matrix may linger as zombies (inner index encoded
//! with [`flip`]) and insertions may wait as pending tuples until
//! [`SparseMatrix::wait`] assembles them.

use std::fmt;
use std::ops::Range;

use super::component::Component;
use super::types::{Element, TypeDesc};
use crate::constants::*;
use crate::error::{Error, Result};

/// Storage format. The values are the format's bit in a sparsity control
/// mask and are part of the kernel encoding.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Hypersparse = 1,
    Sparse = 2,
    Bitmap = 4,
    Full = 8,
}

impl Format {
    /// Formats with offset and index arrays
    pub fn is_compressed(self) -> bool {
        matches!(self, Format::Sparse | Format::Hypersparse)
    }
}

/// Zombie encoding of an inner index. Its own inverse.
#[inline]
pub fn flip(i: i64) -> i64 {
    -i - ZOMBIE_OFFSET
}

#[inline]
pub fn is_zombie(i: i64) -> bool {
    i < 0
}

/// Inner index of a live entry or a zombie
#[inline]
pub fn unflip(i: i64) -> i64 {
    if i < 0 {
        flip(i)
    } else {
        i
    }
}

/// An insertion not yet assembled into the compressed arrays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTuple<T> {
    pub inner: i64,
    pub vector: i64,
    pub value: T,
}

/// A sparse matrix in one of the four storage formats
#[derive(Clone)]
pub struct SparseMatrix<T: Element> {
    pub(crate) vlen: usize,
    pub(crate) vdim: usize,
    pub(crate) by_row: bool,
    pub(crate) format: Format,
    /// Vectors held in `p`: `vdim` unless hypersparse
    pub(crate) nvec: usize,
    /// Offsets; empty for bitmap and full
    pub(crate) p: Component<i64>,
    /// Hyperlist; hypersparse only
    pub(crate) h: Option<Component<i64>>,
    /// Inner indices; empty for bitmap and full
    pub(crate) i: Component<i64>,
    /// Presence bytes; bitmap only
    pub(crate) b: Option<Component<i8>>,
    pub(crate) x: Component<T>,
    /// Present entries of a bitmap matrix
    pub(crate) nvals_bitmap: usize,
    pub(crate) iso: bool,
    pub(crate) jumbled: bool,
    pub(crate) nzombies: usize,
    pub(crate) pending: Vec<PendingTuple<T>>,
}

impl<T: Element> SparseMatrix<T> {
    /// Creates an empty sparse matrix stored by column
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self::empty(n_rows, n_cols, false)
    }

    /// Creates an empty sparse matrix stored by row
    pub fn new_by_row(n_rows: usize, n_cols: usize) -> Self {
        Self::empty(n_rows, n_cols, true)
    }

    fn empty(n_rows: usize, n_cols: usize, by_row: bool) -> Self {
        let (vlen, vdim) = if by_row { (n_cols, n_rows) } else { (n_rows, n_cols) };
        Self {
            vlen,
            vdim,
            by_row,
            format: Format::Sparse,
            nvec: vdim,
            p: Component::owned(vec![0; vdim + 1]),
            h: None,
            i: Component::owned(Vec::new()),
            b: None,
            x: Component::owned(Vec::new()),
            nvals_bitmap: 0,
            iso: false,
            jumbled: false,
            nzombies: 0,
            pending: Vec::new(),
        }
    }

    /// An empty matrix with the same shape and orientation as `self`
    pub fn empty_like(&self) -> Self {
        let (n_rows, n_cols) = self.shape();
        Self::empty(n_rows, n_cols, self.by_row)
    }

    /// Creates a column-oriented sparse matrix from CSC arrays
    ///
    /// # Arguments
    ///
    /// * `n_rows` - Number of rows
    /// * `n_cols` - Number of columns
    /// * `col_ptr` - Column offsets (length `n_cols + 1`)
    /// * `row_idx` - Row index of each entry, sorted within each column
    /// * `values` - Value of each entry
    pub fn from_csc(
        n_rows: usize,
        n_cols: usize,
        col_ptr: Vec<i64>,
        row_idx: Vec<i64>,
        values: Vec<T>,
    ) -> Result<Self> {
        Self::from_compressed(n_rows, n_cols, false, col_ptr, None, row_idx, values, false)
    }

    /// Creates a row-oriented sparse matrix from CSR arrays
    pub fn from_csr(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<i64>,
        col_idx: Vec<i64>,
        values: Vec<T>,
    ) -> Result<Self> {
        Self::from_compressed(n_rows, n_cols, true, row_ptr, None, col_idx, values, false)
    }

    /// Creates a column-oriented iso matrix whose entries all equal `value`
    pub fn iso_from_csc(
        n_rows: usize,
        n_cols: usize,
        col_ptr: Vec<i64>,
        row_idx: Vec<i64>,
        value: T,
    ) -> Result<Self> {
        Self::from_compressed(n_rows, n_cols, false, col_ptr, None, row_idx, vec![value], true)
    }

    /// Creates a hypersparse matrix. `h` lists the vectors present, in
    /// increasing order, and `p` has one more entry than `h`.
    pub fn from_hyper(
        n_rows: usize,
        n_cols: usize,
        by_row: bool,
        p: Vec<i64>,
        h: Vec<i64>,
        i: Vec<i64>,
        x: Vec<T>,
    ) -> Result<Self> {
        Self::from_compressed(n_rows, n_cols, by_row, p, Some(h), i, x, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn from_compressed(
        n_rows: usize,
        n_cols: usize,
        by_row: bool,
        p: Vec<i64>,
        h: Option<Vec<i64>>,
        i: Vec<i64>,
        x: Vec<T>,
        iso: bool,
    ) -> Result<Self> {
        let (vlen, vdim) = if by_row { (n_cols, n_rows) } else { (n_rows, n_cols) };
        let nvec = p.len().saturating_sub(1);
        let format = if h.is_some() { Format::Hypersparse } else { Format::Sparse };
        let nzombies = i.iter().filter(|&&idx| is_zombie(idx)).count();
        let m = Self {
            vlen,
            vdim,
            by_row,
            format,
            nvec,
            p: Component::owned(p),
            h: h.map(Component::owned),
            i: Component::owned(i),
            b: None,
            x: Component::owned(x),
            nvals_bitmap: 0,
            iso,
            jumbled: false,
            nzombies,
            pending: Vec::new(),
        };
        m.check()?;
        Ok(m)
    }

    /// A bitmap or full shell with no values yet
    pub(crate) fn dense_shell(n_rows: usize, n_cols: usize, by_row: bool, format: Format) -> Self {
        let (vlen, vdim) = if by_row { (n_cols, n_rows) } else { (n_rows, n_cols) };
        Self {
            vlen,
            vdim,
            by_row,
            format,
            nvec: vdim,
            p: Component::owned(Vec::new()),
            h: None,
            i: Component::owned(Vec::new()),
            b: None,
            x: Component::owned(Vec::new()),
            nvals_bitmap: 0,
            iso: false,
            jumbled: false,
            nzombies: 0,
            pending: Vec::new(),
        }
    }

    /// Creates a bitmap matrix from presence bytes and values laid out
    /// vector-major (`vlen * vdim` of each)
    pub fn from_bitmap(
        n_rows: usize,
        n_cols: usize,
        by_row: bool,
        b: Vec<i8>,
        x: Vec<T>,
    ) -> Result<Self> {
        let mut m = Self::dense_shell(n_rows, n_cols, by_row, Format::Bitmap);
        m.nvals_bitmap = b.iter().filter(|&&v| v != 0).count();
        m.b = Some(Component::owned(b));
        m.x = Component::owned(x);
        m.check()?;
        Ok(m)
    }

    /// Creates a full matrix from `vlen * vdim` values laid out vector-major
    pub fn from_full(n_rows: usize, n_cols: usize, by_row: bool, x: Vec<T>) -> Result<Self> {
        let mut m = Self::dense_shell(n_rows, n_cols, by_row, Format::Full);
        m.x = Component::owned(x);
        m.check()?;
        Ok(m)
    }

    /// A full iso matrix with every entry equal to `value`
    pub fn iso_full(n_rows: usize, n_cols: usize, by_row: bool, value: T) -> Self {
        let mut m = Self::dense_shell(n_rows, n_cols, by_row, Format::Full);
        m.iso = true;
        m.x = Component::owned(vec![value]);
        m
    }

    /// Builds a column-oriented matrix from `(row, col, value)` triplets.
    /// Later duplicates overwrite earlier ones.
    pub fn from_triplets(n_rows: usize, n_cols: usize, triplets: &[(usize, usize, T)]) -> Result<Self> {
        let mut m = Self::new(n_rows, n_cols);
        for &(row, col, value) in triplets {
            m.set_element(row, col, value)?;
        }
        m.wait()?;
        Ok(m)
    }

    // ------------------------------------------------------------------------
    // shape and storage
    // ------------------------------------------------------------------------

    pub fn nrows(&self) -> usize {
        if self.by_row {
            self.vdim
        } else {
            self.vlen
        }
    }

    pub fn ncols(&self) -> usize {
        if self.by_row {
            self.vlen
        } else {
            self.vdim
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    pub fn vlen(&self) -> usize {
        self.vlen
    }

    pub fn vdim(&self) -> usize {
        self.vdim
    }

    pub fn nvec(&self) -> usize {
        self.nvec
    }

    pub fn is_by_row(&self) -> bool {
        self.by_row
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_iso(&self) -> bool {
        self.iso
    }

    pub fn is_jumbled(&self) -> bool {
        self.jumbled
    }

    pub fn nzombies(&self) -> usize {
        self.nzombies
    }

    pub fn npending(&self) -> usize {
        self.pending.len()
    }

    pub fn type_desc(&self) -> TypeDesc {
        T::type_desc()
    }

    /// Offsets (sparse and hypersparse)
    pub fn p(&self) -> &[i64] {
        &self.p
    }

    pub fn h(&self) -> Option<&[i64]> {
        self.h.as_deref()
    }

    /// Inner indices (sparse and hypersparse), zombies included
    pub fn i(&self) -> &[i64] {
        &self.i
    }

    pub fn b(&self) -> Option<&[i8]> {
        self.b.as_deref()
    }

    /// Stored values: one value when iso
    pub fn x(&self) -> &[T] {
        &self.x
    }

    /// True when any component is a shallow view of another matrix
    pub fn is_shallow(&self) -> bool {
        self.p.is_shallow()
            || self.i.is_shallow()
            || self.x.is_shallow()
            || self.h.as_ref().map_or(false, |h| h.is_shallow())
            || self.b.as_ref().map_or(false, |b| b.is_shallow())
    }

    /// Marks components owned once no other matrix shares them
    pub(crate) fn reclaim(&mut self) {
        self.p.reclaim();
        self.i.reclaim();
        self.x.reclaim();
        if let Some(h) = self.h.as_mut() {
            h.reclaim();
        }
        if let Some(b) = self.b.as_mut() {
            b.reclaim();
        }
    }

    /// Slots held by the storage arrays: entries and zombies of a compressed
    /// matrix, every position of a bitmap or full one
    pub fn nnz_held(&self) -> usize {
        if self.format.is_compressed() {
            self.p.get(self.nvec).map_or(0, |&n| n as usize)
        } else {
            self.vlen * self.vdim
        }
    }

    /// Number of live entries. Pending tuples are not counted.
    pub fn nvals(&self) -> usize {
        match self.format {
            Format::Sparse | Format::Hypersparse => self.nnz_held() - self.nzombies,
            Format::Bitmap => self.nvals_bitmap,
            Format::Full => self.vlen * self.vdim,
        }
    }

    /// Zombies, pending tuples or unsorted vectors are waiting
    pub fn has_pending_work(&self) -> bool {
        self.nzombies > 0 || !self.pending.is_empty() || self.jumbled
    }

    /// Value of the entry stored at offset `p`
    #[inline]
    pub fn value_at(&self, p: usize) -> T {
        if self.iso {
            self.x[0]
        } else {
            self.x[p]
        }
    }

    /// Coordinate of the `k`th vector held
    #[inline]
    pub fn vector_of(&self, k: usize) -> i64 {
        match &self.h {
            Some(h) => h[k],
            None => k as i64,
        }
    }

    /// Storage offsets of the `k`th vector held
    #[inline]
    pub fn vector_range(&self, k: usize) -> Range<usize> {
        if self.format.is_compressed() {
            self.p[k] as usize..self.p[k + 1] as usize
        } else {
            k * self.vlen..(k + 1) * self.vlen
        }
    }

    /// `(row, col)` of an inner index within a vector
    #[inline]
    pub fn coords(&self, inner: i64, vector: i64) -> (i64, i64) {
        if self.by_row {
            (vector, inner)
        } else {
            (inner, vector)
        }
    }

    /// `(inner, vector)` of a row and column
    #[inline]
    pub fn inner_vector(&self, row: usize, col: usize) -> (i64, i64) {
        if self.by_row {
            (col as i64, row as i64)
        } else {
            (row as i64, col as i64)
        }
    }

    /// Every position holds an entry, whatever the format
    pub fn as_if_full(&self) -> bool {
        match self.format {
            Format::Full => true,
            Format::Bitmap => false,
            Format::Sparse | Format::Hypersparse => {
                self.nvec == self.vdim
                    && self.nzombies == 0
                    && self.pending.is_empty()
                    && !self.jumbled
                    && self.nnz_held() == self.vlen * self.vdim
            }
        }
    }

    /// A matrix sharing every component of `self`
    pub fn shallow_copy(&self) -> Self {
        Self {
            vlen: self.vlen,
            vdim: self.vdim,
            by_row: self.by_row,
            format: self.format,
            nvec: self.nvec,
            p: self.p.share(),
            h: self.h.as_ref().map(Component::share),
            i: self.i.share(),
            b: self.b.as_ref().map(Component::share),
            x: self.x.share(),
            nvals_bitmap: self.nvals_bitmap,
            iso: self.iso,
            jumbled: self.jumbled,
            nzombies: self.nzombies,
            pending: self.pending.clone(),
        }
    }

    /// A matrix sharing the pattern of `self` with new values. `x` holds a
    /// single value when `iso` is set.
    pub(crate) fn with_values(&self, x: Vec<T>, iso: bool) -> Self {
        let mut c = self.shallow_copy();
        c.x = Component::owned(x);
        c.iso = iso;
        c
    }

    /// A deep copy owning all of its components
    pub fn dup(&self) -> Self {
        self.clone()
    }

    // ------------------------------------------------------------------------
    // reading entries
    // ------------------------------------------------------------------------

    /// Entry at `(row, col)`, looking at pending insertions first
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        let (inner, vector) = self.inner_vector(row, col);
        if let Some(t) = self
            .pending
            .iter()
            .rev()
            .find(|t| t.inner == inner && t.vector == vector)
        {
            return Some(t.value);
        }
        self.find_entry(inner, vector).and_then(|p| {
            if self.format.is_compressed() && is_zombie(self.i[p]) {
                None
            } else {
                Some(self.value_at(p))
            }
        })
    }

    /// Storage offset of `(inner, vector)`, zombie or not. Bitmap positions
    /// are returned only when present.
    pub(crate) fn find_entry(&self, inner: i64, vector: i64) -> Option<usize> {
        if inner < 0 || vector < 0 || inner as usize >= self.vlen || vector as usize >= self.vdim {
            return None;
        }
        match self.format {
            Format::Full => Some(vector as usize * self.vlen + inner as usize),
            Format::Bitmap => {
                let q = vector as usize * self.vlen + inner as usize;
                self.b.as_ref().filter(|b| b[q] != 0).map(|_| q)
            }
            Format::Sparse | Format::Hypersparse => {
                let k = match &self.h {
                    Some(h) => h.binary_search(&vector).ok()?,
                    None => vector as usize,
                };
                let range = self.vector_range(k);
                let start = range.start;
                let idx = &self.i[range];
                if self.jumbled {
                    idx.iter().position(|&ii| unflip(ii) == inner).map(|o| start + o)
                } else {
                    // zombies keep their position, so the unflipped indices stay sorted
                    idx.binary_search_by_key(&inner, |&ii| unflip(ii))
                        .ok()
                        .map(|o| start + o)
                }
            }
        }
    }

    /// Live entries as `(row, col, value)`, sorted by row then column.
    /// Pending tuples are not included.
    pub fn extract_tuples(&self) -> Vec<(usize, usize, T)> {
        let mut out = Vec::with_capacity(self.nvals());
        for k in 0..self.nvec {
            let j = self.vector_of(k);
            for p in self.vector_range(k) {
                let inner = match self.format {
                    Format::Sparse | Format::Hypersparse => {
                        let ii = self.i[p];
                        if is_zombie(ii) {
                            continue;
                        }
                        ii
                    }
                    Format::Bitmap => {
                        if self.b.as_ref().map_or(true, |b| b[p] == 0) {
                            continue;
                        }
                        (p % self.vlen) as i64
                    }
                    Format::Full => (p % self.vlen) as i64,
                };
                let (row, col) = self.coords(inner, j);
                out.push((row as usize, col as usize, self.value_at(p)));
            }
        }
        out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        out
    }

    // ------------------------------------------------------------------------
    // invariants
    // ------------------------------------------------------------------------

    /// Verifies the structural invariants of the descriptor
    pub fn check(&self) -> Result<()> {
        if self.iso && self.x.len() != 1 {
            return Err(Error::invalid(format!(
                "iso matrix must hold exactly one value, found {}",
                self.x.len()
            )));
        }
        match self.format {
            Format::Sparse | Format::Hypersparse => self.check_compressed(),
            Format::Bitmap => {
                let n = self.vlen * self.vdim;
                let b = self
                    .b
                    .as_ref()
                    .ok_or_else(|| Error::invalid("bitmap matrix without a bitmap"))?;
                if b.len() != n {
                    return Err(Error::invalid(format!("bitmap has {} bytes, expected {n}", b.len())));
                }
                if !self.iso && self.x.len() != n {
                    return Err(Error::invalid(format!("bitmap has {} values, expected {n}", self.x.len())));
                }
                if b.iter().any(|&v| v != 0 && v != 1) {
                    return Err(Error::invalid("bitmap entries must be 0 or 1"));
                }
                let count = b.iter().filter(|&&v| v != 0).count();
                if count != self.nvals_bitmap {
                    return Err(Error::invalid(format!(
                        "bitmap holds {count} entries but records {}",
                        self.nvals_bitmap
                    )));
                }
                Ok(())
            }
            Format::Full => {
                let n = self.vlen * self.vdim;
                if !self.iso && self.x.len() != n {
                    return Err(Error::invalid(format!("full matrix has {} values, expected {n}", self.x.len())));
                }
                Ok(())
            }
        }
    }

    fn check_compressed(&self) -> Result<()> {
        if self.p.len() != self.nvec + 1 {
            return Err(Error::invalid(format!(
                "offsets have length {}, expected {}",
                self.p.len(),
                self.nvec + 1
            )));
        }
        if self.p[0] != 0 {
            return Err(Error::invalid("offsets must start at 0"));
        }
        if self.p.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::invalid("offsets must be non-decreasing"));
        }
        let nnz = self.p[self.nvec] as usize;
        if self.i.len() != nnz {
            return Err(Error::invalid(format!(
                "{} indices for {nnz} entries",
                self.i.len()
            )));
        }
        if !self.iso && self.x.len() != nnz {
            return Err(Error::invalid(format!("{} values for {nnz} entries", self.x.len())));
        }
        match &self.h {
            Some(h) => {
                if h.len() != self.nvec {
                    return Err(Error::invalid("hyperlist length must equal nvec"));
                }
                if h.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(Error::invalid("hyperlist must be strictly increasing"));
                }
                if h.iter().any(|&j| j < 0 || j as usize >= self.vdim) {
                    return Err(Error::invalid("hyperlist entry out of range"));
                }
            }
            None => {
                if self.nvec != self.vdim {
                    return Err(Error::invalid("sparse matrix must hold every vector"));
                }
            }
        }
        let mut zombies = 0;
        for k in 0..self.nvec {
            let mut last = -1i64;
            for &ii in &self.i[self.vector_range(k)] {
                if is_zombie(ii) {
                    zombies += 1;
                }
                let inner = unflip(ii);
                if inner as usize >= self.vlen {
                    return Err(Error::invalid(format!("inner index {inner} out of range")));
                }
                if !self.jumbled && inner <= last {
                    return Err(Error::invalid(format!(
                        "vector {} is not sorted or has duplicates",
                        self.vector_of(k)
                    )));
                }
                last = inner;
            }
        }
        if zombies != self.nzombies {
            return Err(Error::invalid(format!(
                "{zombies} zombies found but {} recorded",
                self.nzombies
            )));
        }
        Ok(())
    }
}

impl<T: Element> fmt::Debug for SparseMatrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseMatrix<{}> {{", T::type_desc().name)?;
        writeln!(f, "  dimensions: {} × {}", self.nrows(), self.ncols())?;
        writeln!(
            f,
            "  format: {:?} by {}{}",
            self.format,
            if self.by_row { "row" } else { "column" },
            if self.iso { " (iso)" } else { "" }
        )?;
        writeln!(
            f,
            "  nvals: {} (zombies: {}, pending: {})",
            self.nvals(),
            self.nzombies,
            self.pending.len()
        )?;

        let max_vectors = MAX_DISPLAY_VECTORS.min(self.nvec);
        for k in 0..max_vectors {
            write!(f, "    vector {}: ", self.vector_of(k))?;
            let range = self.vector_range(k);
            let shown = range.clone().take(MAX_DISPLAY_ELEMENTS_PER_VECTOR);
            for p in shown {
                match self.format {
                    Format::Sparse | Format::Hypersparse => {
                        write!(f, "({}, {:?}) ", self.i[p], self.value_at(p))?
                    }
                    Format::Bitmap if self.b.as_ref().map_or(true, |b| b[p] == 0) => {}
                    _ => write!(f, "({}, {:?}) ", p % self.vlen.max(1), self.value_at(p))?,
                }
            }
            if range.len() > MAX_DISPLAY_ELEMENTS_PER_VECTOR {
                write!(f, "... ({} more)", range.len() - MAX_DISPLAY_ELEMENTS_PER_VECTOR)?;
            }
            writeln!(f)?;
        }
        if self.nvec > max_vectors {
            writeln!(f, "    ... ({} more vectors)", self.nvec - max_vectors)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix<f64> {
        // [1 . 4]
        // [. 3 .]
        // [2 . 5]
        SparseMatrix::from_csc(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 2, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap()
    }

    #[test]
    fn test_new_matrix() {
        let m = sample();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.nvals(), 5);
        assert_eq!(m.format(), Format::Sparse);
        assert_eq!(m.get(2, 0), Some(2.0));
        assert_eq!(m.get(1, 0), None);
        assert_eq!(
            m.extract_tuples(),
            vec![
                (0, 0, 1.0),
                (0, 2, 4.0),
                (1, 1, 3.0),
                (2, 0, 2.0),
                (2, 2, 5.0)
            ]
        );
    }

    #[test]
    fn test_zombie_flip() {
        for i in [0, 1, 7, 1 << 40] {
            assert!(is_zombie(flip(i)));
            assert_eq!(flip(flip(i)), i);
            assert_eq!(unflip(flip(i)), i);
            assert_eq!(unflip(i), i);
        }
    }

    #[test]
    fn test_rejects_bad_arrays() {
        assert!(SparseMatrix::<f64>::from_csc(2, 2, vec![0, 1], vec![0], vec![1.0]).is_err());
        assert!(SparseMatrix::<f64>::from_csc(2, 2, vec![0, 2, 2], vec![1, 0], vec![1.0, 2.0]).is_err());
        assert!(SparseMatrix::<f64>::from_csc(2, 2, vec![0, 1, 1], vec![5], vec![1.0]).is_err());
        assert!(SparseMatrix::<f64>::from_hyper(2, 4, false, vec![0, 1, 2], vec![3, 1], vec![0, 0], vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_hyper_and_row_orientation() {
        let h = SparseMatrix::from_hyper(4, 100, false, vec![0, 1, 3], vec![7, 42], vec![3, 0, 2], vec![1, 2, 3]).unwrap();
        assert_eq!(h.format(), Format::Hypersparse);
        assert_eq!(h.nvec(), 2);
        assert_eq!(h.get(2, 42), Some(3));
        assert_eq!(h.get(2, 41), None);

        let r = SparseMatrix::from_csr(2, 3, vec![0, 2, 3], vec![0, 2, 1], vec![1, 2, 3]).unwrap();
        assert!(r.is_by_row());
        assert_eq!(r.vlen(), 3);
        assert_eq!(r.extract_tuples(), vec![(0, 0, 1), (0, 2, 2), (1, 1, 3)]);
    }

    #[test]
    fn test_bitmap_full_iso() {
        let bm = SparseMatrix::from_bitmap(2, 2, false, vec![1, 0, 0, 1], vec![1.0, 0.0, 0.0, 4.0]).unwrap();
        assert_eq!(bm.nvals(), 2);
        assert_eq!(bm.get(1, 1), Some(4.0));
        assert_eq!(bm.get(1, 0), None);

        let full = SparseMatrix::from_full(2, 2, false, vec![1, 2, 3, 4]).unwrap();
        assert!(full.as_if_full());
        assert_eq!(full.get(1, 0), Some(2));

        let iso = SparseMatrix::iso_from_csc(3, 1, vec![0, 2], vec![0, 2], 7u8).unwrap();
        assert!(iso.is_iso());
        assert_eq!(iso.extract_tuples(), vec![(0, 0, 7), (2, 0, 7)]);

        let all = SparseMatrix::iso_full(2, 3, true, 1.5f32);
        assert_eq!(all.nvals(), 6);
        assert_eq!(all.get(1, 2), Some(1.5));
    }

    #[test]
    fn test_as_if_full_sparse() {
        let m = SparseMatrix::from_csc(2, 2, vec![0, 2, 4], vec![0, 1, 0, 1], vec![1, 2, 3, 4]).unwrap();
        assert!(m.as_if_full());
        assert!(!sample().as_if_full());
    }

    #[test]
    fn test_shallow_copy_shares() {
        let m = sample();
        let s = m.shallow_copy();
        assert!(s.is_shallow());
        assert!(!m.is_shallow());
        assert!(s.x.shares_with(&m.x));
        let d = m.dup();
        assert!(!d.is_shallow());
        assert!(!d.x.shares_with(&m.x));
        assert_eq!(d.extract_tuples(), m.extract_tuples());
    }
}
