//! # JIT kernel pipeline
//!
//! A problem (kernel family, operators, operand types, formats and iso
//! flags) is encoded into a fixed record plus a name suffix and hashed. The
//! runtime then looks for a kernel in three places, in order:
//!
//! 1. the in-memory [`KernelCache`];
//! 2. a library already compiled into the cache folder by this or an
//!    earlier process, which is loaded if it is still current;
//! 3. a fresh build: the C source is generated by [`macrofy`], compiled by
//!    the external compiler, then loaded.
//!
//! How far the search may go is set by [`JitControl`]. Every failure short
//! of running out of memory is reported as a non-fatal error, and callers
//! fall back to the generic kernels.

pub mod cache;
pub mod compiler;
pub mod dispatch;
pub mod encoding;
pub mod macrofy;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

pub use cache::{KernelCache, KernelEntry};
pub use dispatch::Context;
pub use encoding::{encode, EncodedProblem, KernelFamily, MonoidText, Problem, Role};

use crate::config::{JitConfig, JitControl};
use crate::error::{Error, Result};

/// Counters of how kernel requests were served
#[derive(Debug, Default)]
pub struct JitStats {
    hits: AtomicU64,
    loads: AtomicU64,
    compiles: AtomicU64,
    fallbacks: AtomicU64,
}

/// A point-in-time copy of [`JitStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitStatsSnapshot {
    /// Served from the in-memory table
    pub hits: u64,
    /// Loaded from a library already in the cache folder
    pub loads: u64,
    /// Compiled and loaded
    pub compiles: u64,
    /// Ran the generic kernel instead
    pub fallbacks: u64,
}

impl JitStats {
    fn snapshot(&self) -> JitStatsSnapshot {
        JitStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            compiles: self.compiles.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Kernel table, cache folder settings and counters
pub struct JitRuntime {
    config: RwLock<JitConfig>,
    cache: KernelCache,
    // serializes loading and compiling; lookups never take it
    compile_lock: Mutex<()>,
    stats: JitStats,
}

static GLOBAL: OnceLock<Arc<JitRuntime>> = OnceLock::new();

impl JitRuntime {
    pub fn new(config: JitConfig) -> Self {
        Self {
            config: RwLock::new(config),
            cache: KernelCache::new(),
            compile_lock: Mutex::new(()),
            stats: JitStats::default(),
        }
    }

    /// The process-wide runtime, configured from the environment on first use
    pub fn global() -> Arc<JitRuntime> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(JitRuntime::new(JitConfig::from_env()))))
    }

    /// Configures the process-wide runtime and returns it
    pub fn init(config: JitConfig) -> Arc<JitRuntime> {
        let mut pending = Some(config);
        let runtime = GLOBAL.get_or_init(|| {
            Arc::new(JitRuntime::new(pending.take().unwrap_or_else(JitConfig::from_env)))
        });
        if let Some(config) = pending {
            runtime.set_config(config);
        }
        log::debug!("jit runtime ready, cache at {:?}", runtime.config().cache_path);
        Arc::clone(runtime)
    }

    /// Drops every kernel held by the process-wide runtime. Libraries are
    /// unloaded once no caller holds their entries.
    pub fn teardown() {
        if let Some(runtime) = GLOBAL.get() {
            log::debug!("jit runtime teardown: dropping {} kernels", runtime.cache.len());
            runtime.cache.clear();
        }
    }

    /// A copy of the current configuration
    pub fn config(&self) -> JitConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_config(&self, config: JitConfig) {
        let off = config.control == JitControl::Off;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        if off {
            self.cache.clear();
        }
    }

    /// Changes the control mode. Switching to `Off` empties the kernel table.
    pub fn set_control(&self, control: JitControl) {
        self.config.write().unwrap_or_else(PoisonError::into_inner).control = control;
        if control == JitControl::Off {
            self.cache.clear();
        }
    }

    pub fn control(&self) -> JitControl {
        self.config.read().unwrap_or_else(PoisonError::into_inner).control
    }

    pub fn stats(&self) -> JitStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub(crate) fn note_fallback(&self) {
        self.stats.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Finds, loads or builds the kernel for `ep`
    pub fn kernel(&self, ep: &EncodedProblem) -> Result<Arc<KernelEntry>> {
        let config = self.config();
        if config.control <= JitControl::Pause {
            return Err(Error::Unsupported(format!("JIT is {:?}", config.control)));
        }
        if let Some(entry) = self.lookup(ep) {
            return Ok(entry);
        }
        if config.control == JitControl::Run {
            return Err(Error::Unsupported(format!(
                "{} is not loaded and JIT is Run",
                ep.kernel_name()
            )));
        }

        let _guard = self.compile_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // another thread may have finished it while we waited
        if let Some(entry) = self.lookup(ep) {
            return Ok(entry);
        }

        let name = ep.kernel_name();
        let path = compiler::library_path(&config, &name);
        if path.exists() {
            match compiler::load(&path) {
                Ok(library) if compiler::is_current(&library, ep) => {
                    let entry = compiler::entry_point(&library, &path)?;
                    let entry = self.cache.insert(KernelEntry::from_library(ep, path, library, entry))?;
                    self.stats.loads.fetch_add(1, Ordering::Relaxed);
                    log::debug!("{name}: loaded");
                    return Ok(entry);
                }
                Ok(_) => log::info!("{name}: library in the cache folder is stale, rebuilding"),
                Err(err) => log::debug!("{name}: {err}"),
            }
        }
        if config.control < JitControl::On {
            return Err(Error::Unsupported(format!(
                "{name} has no current library and JIT is {:?}",
                config.control
            )));
        }

        let path = compiler::compile(&config, ep)?;
        let library = compiler::load(&path)?;
        if !compiler::is_current(&library, ep) {
            return Err(Error::Load {
                path,
                reason: "freshly compiled library reports a different problem".to_string(),
            });
        }
        let entry = compiler::entry_point(&library, &path)?;
        let entry = self.cache.insert(KernelEntry::from_library(ep, path, library, entry))?;
        self.stats.compiles.fetch_add(1, Ordering::Relaxed);
        log::info!("{name}: compiled");
        Ok(entry)
    }

    fn lookup(&self, ep: &EncodedProblem) -> Option<Arc<KernelEntry>> {
        let entry = self.cache.lookup(ep.hash, &ep.encoding, &ep.suffix)?;
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        log::trace!("{}: cached", entry.name);
        Some(entry)
    }

    /// Adds a kernel that is linked into the process
    pub fn register(&self, entry: KernelEntry) -> Result<Arc<KernelEntry>> {
        self.cache.insert(entry)
    }
}

impl Default for JitRuntime {
    fn default() -> Self {
        Self::new(JitConfig::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Element, Format};
    use crate::ops::{BinaryOpcode, OpSignature, UnaryOpcode};
    use crate::kernels::abi::KernelMatrix;
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

    fn apply_problem() -> EncodedProblem {
        let problem = Problem::new(KernelFamily::Apply)
            .with_op(0, OpSignature::builtin(UnaryOpcode::Ainv as u8, UnaryOpcode::Ainv.name()))
            .with_operand(Role::C, f64::type_desc(), Format::Sparse, false)
            .with_operand(Role::A, f64::type_desc(), Format::Sparse, false);
        encode(&problem).unwrap()
    }

    fn runtime(control: JitControl) -> (tempfile::TempDir, JitRuntime) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = JitConfig::with_cache_path(dir.path());
        config.control = control;
        (dir, JitRuntime::new(config))
    }

    #[test]
    fn test_off_and_pause_refuse() {
        let ep = apply_problem();
        for control in [JitControl::Off, JitControl::Pause] {
            let (_dir, rt) = runtime(control);
            assert!(matches!(rt.kernel(&ep), Err(Error::Unsupported(_))));
        }
    }

    #[test]
    fn test_run_serves_registered_kernels_only() {
        let ep = apply_problem();
        let (_dir, rt) = runtime(JitControl::Run);
        assert!(matches!(rt.kernel(&ep), Err(Error::Unsupported(_))));

        rt.register(KernelEntry::from_fn(&ep, noop)).unwrap();
        let first = rt.kernel(&ep).unwrap();
        let second = rt.kernel(&ep).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(rt.stats().hits, 2);
        assert_eq!(rt.stats().compiles, 0);
    }

    #[test]
    fn test_load_never_compiles() {
        let ep = apply_problem();
        let (dir, rt) = runtime(JitControl::Load);
        assert!(matches!(rt.kernel(&ep), Err(Error::Unsupported(_))));
        assert!(!dir.path().join("src").exists());
    }

    #[test]
    fn test_pause_keeps_kernels_and_off_drops_them() {
        let ep = apply_problem();
        let (_dir, rt) = runtime(JitControl::Run);
        rt.register(KernelEntry::from_fn(&ep, noop)).unwrap();

        rt.set_control(JitControl::Pause);
        assert!(rt.kernel(&ep).is_err());
        assert_eq!(rt.cache_len(), 1);

        rt.set_control(JitControl::Off);
        assert_eq!(rt.cache_len(), 0);
        rt.set_control(JitControl::Run);
        assert!(rt.kernel(&ep).is_err());
    }

    #[test]
    fn test_distinct_problems_are_distinct_entries() {
        let (_dir, rt) = runtime(JitControl::Run);
        let a = apply_problem();
        let b = encode(
            &Problem::new(KernelFamily::EwiseFull)
                .with_op(0, OpSignature::builtin(BinaryOpcode::Plus as u8, BinaryOpcode::Plus.name()))
                .with_operand(Role::C, f64::type_desc(), Format::Full, false)
                .with_operand(Role::A, f64::type_desc(), Format::Full, false)
                .with_operand(Role::B, f64::type_desc(), Format::Full, false),
        )
        .unwrap();
        rt.register(KernelEntry::from_fn(&a, noop)).unwrap();
        rt.register(KernelEntry::from_fn(&b, noop)).unwrap();
        assert_eq!(rt.cache_len(), 2);
        assert_ne!(rt.kernel(&a).unwrap().name, rt.kernel(&b).unwrap().name);
    }
}
