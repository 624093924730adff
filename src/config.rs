//! Configuration and system parameters for sparsejit

use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::*;

/// System parameters for parallel work distribution
#[derive(Debug, Clone)]
pub struct SystemParameters {
    /// Maximum number of threads a single call may use
    pub n_threads: usize,
    /// Work a thread should own before another thread is started
    pub chunk: f64,
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get(), // Use all available cores
            chunk: DEFAULT_CHUNK,
        }
    }
}

impl SystemParameters {
    /// Single-threaded parameters, handy for deterministic tests
    pub fn serial() -> Self {
        Self {
            n_threads: 1,
            chunk: DEFAULT_CHUNK,
        }
    }

    /// Parameters overridden by `SPARSEJIT_THREADS` when set
    pub fn from_env() -> Self {
        let mut params = Self::default();
        if let Some(n) = std::env::var(ENV_THREADS)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            params.n_threads = n.max(1);
        }
        params
    }
}

/// How far the JIT is allowed to go when a kernel is requested
///
/// The modes are ordered: each one permits everything the previous one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JitControl {
    /// No JIT kernels are used; the in-memory kernel table is cleared
    Off,
    /// No JIT kernels are used, but loaded kernels are kept for later
    Pause,
    /// Only kernels already in the in-memory table may run
    Run,
    /// Kernels may also be loaded from the cache folder, never compiled
    Load,
    /// Kernels may be loaded or compiled
    On,
}

impl FromStr for JitControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" | "false" => Ok(JitControl::Off),
            "pause" => Ok(JitControl::Pause),
            "run" => Ok(JitControl::Run),
            "load" => Ok(JitControl::Load),
            "on" | "1" | "true" => Ok(JitControl::On),
            other => Err(format!("unknown JIT control '{other}'")),
        }
    }
}

/// Configuration of the JIT kernel pipeline
#[derive(Debug, Clone)]
pub struct JitConfig {
    /// What the JIT may do
    pub control: JitControl,
    /// Root of the persistent kernel cache
    pub cache_path: PathBuf,
    /// C compiler executable
    pub compiler: String,
    /// Flags passed to the compiler
    pub c_flags: String,
    /// Libraries linked into each kernel
    pub c_libs: String,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            control: JitControl::On,
            cache_path: default_cache_path(),
            compiler: DEFAULT_COMPILER.to_string(),
            c_flags: DEFAULT_C_FLAGS.to_string(),
            c_libs: DEFAULT_C_LIBS.to_string(),
        }
    }
}

impl JitConfig {
    /// Create a config whose cache lives under `path`
    pub fn with_cache_path(path: impl Into<PathBuf>) -> Self {
        Self {
            cache_path: path.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by the `SPARSEJIT_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(cc) = std::env::var(ENV_COMPILER) {
            if !cc.trim().is_empty() {
                config.compiler = cc;
            }
        }
        if let Ok(mode) = std::env::var(ENV_JIT_CONTROL) {
            match mode.parse() {
                Ok(control) => config.control = control,
                Err(err) => log::warn!("ignoring {ENV_JIT_CONTROL}: {err}"),
            }
        }
        config
    }

    /// Folder holding generated sources
    pub fn source_dir(&self) -> PathBuf {
        self.cache_path.join("src")
    }

    /// Folder holding compiled kernel libraries
    pub fn lib_dir(&self) -> PathBuf {
        self.cache_path.join("lib")
    }

    /// Folder holding the kernel family templates
    pub fn include_dir(&self) -> PathBuf {
        self.cache_path.join("include")
    }
}

/// Resolves the kernel cache root: `SPARSEJIT_CACHE_PATH`, then the user
/// cache folder, then the home folder, then the system temp folder
pub fn default_cache_path() -> PathBuf {
    if let Ok(custom) = std::env::var(ENV_CACHE_PATH) {
        if !custom.trim().is_empty() {
            return PathBuf::from(custom);
        }
    }
    let version = env!("CARGO_PKG_VERSION");
    if let Some(base) = dirs::cache_dir() {
        base.join("sparsejit").join(version)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".sparsejit").join(version)
    } else {
        std::env::temp_dir().join("sparsejit").join(version)
    }
}
