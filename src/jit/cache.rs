//! In-memory table of loaded kernels
//!
//! Entries are bucketed by hash and matched on the full encoding and
//! suffix. An entry is never replaced or removed while the table is in use:
//! callers hold an `Arc` to it, and the shared library it came from stays
//! loaded for as long as any holder remains.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use libloading::Library;

use super::encoding::{EncodedProblem, Encoding};
use crate::constants::DEFN_SLOTS;
use crate::error::{Error, Result};
use crate::kernels::abi::KernelFn;

/// A kernel ready to run
pub struct KernelEntry {
    pub hash: u64,
    pub encoding: Encoding,
    pub suffix: String,
    pub name: String,
    /// Definitions the kernel was compiled with
    pub definitions: [Option<String>; DEFN_SLOTS],
    pub path: PathBuf,
    entry: KernelFn,
    // keeps `entry` valid; None for kernels linked into the process
    _library: Option<Library>,
}

impl KernelEntry {
    pub(crate) fn from_library(problem: &EncodedProblem, path: PathBuf, library: Library, entry: KernelFn) -> Self {
        Self {
            hash: problem.hash,
            encoding: problem.encoding.clone(),
            suffix: problem.suffix.clone(),
            name: problem.kernel_name(),
            definitions: problem.definitions(),
            path,
            entry,
            _library: Some(library),
        }
    }

    /// An entry for a kernel function already present in the process
    pub fn from_fn(problem: &EncodedProblem, entry: KernelFn) -> Self {
        Self {
            hash: problem.hash,
            encoding: problem.encoding.clone(),
            suffix: problem.suffix.clone(),
            name: problem.kernel_name(),
            definitions: problem.definitions(),
            path: PathBuf::new(),
            entry,
            _library: None,
        }
    }

    pub fn entry(&self) -> KernelFn {
        self.entry
    }

    fn matches(&self, encoding: &Encoding, suffix: &str) -> bool {
        self.encoding == *encoding && self.suffix == suffix
    }
}

impl fmt::Debug for KernelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelEntry")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

/// Hash-keyed table of kernel entries
#[derive(Default)]
pub struct KernelCache {
    buckets: RwLock<HashMap<u64, Vec<Arc<KernelEntry>>>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `(hash, encoding, suffix)`, if one was inserted
    pub fn lookup(&self, hash: u64, encoding: &Encoding, suffix: &str) -> Option<Arc<KernelEntry>> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .get(&hash)?
            .iter()
            .find(|e| e.matches(encoding, suffix))
            .cloned()
    }

    /// Inserts `entry` unless an equal key is already present, in which case
    /// the existing entry is returned and `entry` is dropped
    pub fn insert(&self, entry: KernelEntry) -> Result<Arc<KernelEntry>> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = buckets
            .get(&entry.hash)
            .and_then(|bucket| bucket.iter().find(|e| e.matches(&entry.encoding, &entry.suffix)))
        {
            return Ok(Arc::clone(existing));
        }
        buckets.try_reserve(1).map_err(|_| Error::OutOfMemory {
            size: std::mem::size_of::<(u64, Vec<Arc<KernelEntry>>)>(),
        })?;
        let bucket = buckets.entry(entry.hash).or_default();
        bucket.try_reserve(1).map_err(|_| Error::OutOfMemory {
            size: std::mem::size_of::<Arc<KernelEntry>>(),
        })?;
        let entry = Arc::new(entry);
        bucket.push(Arc::clone(&entry));
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every entry. Kernels still held by callers stay loaded until
    /// released.
    pub fn clear(&self) {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::encoding::{encode, KernelFamily, Problem, Role};
    use crate::kernels::abi::KernelMatrix;
    use crate::matrix::{Element, Format};
    use crate::ops::OpSignature;
    use std::ffi::c_void;
    use std::os::raw::c_int;

    unsafe extern "C" fn noop(
        _c: *mut KernelMatrix,
        _a: *const KernelMatrix,
        _b: *const KernelMatrix,
        _ntasks: c_int,
        _nthreads: c_int,
        _slicing: *const i64,
        _scalar: *mut c_void,
    ) -> c_int {
        0
    }

    fn problem(name: &str) -> EncodedProblem {
        encode(
            &Problem::new(KernelFamily::Apply)
                .with_op(0, OpSignature::user(name, "void f (double *z, const double *x) { *z = *x ; }"))
                .with_operand(Role::A, f64::type_desc(), Format::Sparse, false),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_after_insert() {
        let cache = KernelCache::new();
        let p = problem("f");
        assert!(cache.lookup(p.hash, &p.encoding, &p.suffix).is_none());
        let e = cache.insert(KernelEntry::from_fn(&p, noop)).unwrap();
        let found = cache.lookup(p.hash, &p.encoding, &p.suffix).unwrap();
        assert!(Arc::ptr_eq(&e, &found));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = KernelCache::new();
        let p = problem("g");
        let first = cache.insert(KernelEntry::from_fn(&p, noop)).unwrap();
        let second = cache.insert(KernelEntry::from_fn(&p, noop)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_same_hash_different_suffix() {
        let cache = KernelCache::new();
        let p = problem("h");
        cache.insert(KernelEntry::from_fn(&p, noop)).unwrap();
        // a lookup with the right hash but another suffix misses
        assert!(cache.lookup(p.hash, &p.encoding, "1:z").is_none());
    }

    #[test]
    fn test_clear_keeps_held_entries_alive() {
        let cache = KernelCache::new();
        let p = problem("k");
        let held = cache.insert(KernelEntry::from_fn(&p, noop)).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(held.name, p.kernel_name());
    }
}
