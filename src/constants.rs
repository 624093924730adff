//! Centralized constants for the sparsejit library
//!
//! This module contains the hardcoded constants used throughout the codebase.
//! New constants should be added here rather than scattered throughout the code.
//! Constants are organized by category for easy reference and maintenance.

// ============================================================================
// PARALLEL WORK HEURISTICS
// ============================================================================

/// Default amount of work (entries + weighted vectors) a single thread
/// should own before another thread is worth starting
pub const DEFAULT_CHUNK: f64 = 64.0 * 1024.0;

/// Tasks created per thread when slicing a matrix
pub const TASKS_PER_THREAD: usize = 8;

/// Cost charged per vector when estimating slicing work
pub const VECTOR_OVERHEAD: usize = 8;

// ============================================================================
// ZOMBIE ENCODING
// ============================================================================

/// Offset used by the zombie flip: `flip(i) = -i - ZOMBIE_OFFSET`
pub const ZOMBIE_OFFSET: i64 = 2;

// ============================================================================
// JIT KERNEL PIPELINE
// ============================================================================

/// Hash value reserved as the NOT_JITTABLE sentinel
pub const NOT_JITTABLE: u64 = u64::MAX;

/// Replacement used when a real hash lands on the sentinel
pub const HASH_SENTINEL_REMAP: u64 = 0x9e37_79b9_7f4a_7c15;

/// Prefix of every generated kernel name
pub const KERNEL_PREFIX: &str = "sjit";

/// Entry point exported by every kernel artifact
pub const KERNEL_SYMBOL: &[u8] = b"sjit_kernel\0";

/// Version query exported by every kernel artifact
pub const QUERY_VERSION_SYMBOL: &[u8] = b"sjit_query_version\0";

/// Definition query exported by artifacts built for user ops/types
pub const QUERY_DEFN_SYMBOL: &[u8] = b"sjit_query_defn\0";

/// Monoid identity/terminal query exported by reduction artifacts
pub const QUERY_MONOID_SYMBOL: &[u8] = b"sjit_query_monoid\0";

/// Version stamped into generated kernels; bump whenever a template or the
/// kernel ABI changes so that stale artifacts are rebuilt
pub const KERNEL_ABI_VERSION: [i32; 3] = [0, 1, 0];

/// Number of definition slots reported by `sjit_query_defn`
pub const DEFN_SLOTS: usize = 5;

/// Environment variable overriding the kernel cache folder
pub const ENV_CACHE_PATH: &str = "SPARSEJIT_CACHE_PATH";

/// Environment variable overriding the C compiler
pub const ENV_COMPILER: &str = "SPARSEJIT_CC";

/// Environment variable overriding the JIT control mode
pub const ENV_JIT_CONTROL: &str = "SPARSEJIT_JIT";

/// Environment variable overriding the maximum thread count
pub const ENV_THREADS: &str = "SPARSEJIT_THREADS";

/// Default C compiler
pub const DEFAULT_COMPILER: &str = "cc";

/// Default compiler flags
pub const DEFAULT_C_FLAGS: &str = "-O3 -std=c11 -fPIC -shared";

/// Default libraries linked into each kernel
pub const DEFAULT_C_LIBS: &str = "-lm";

// ============================================================================
// DEVICE OFFLOAD
// ============================================================================

/// Work units a single accelerator should own before it is worth using
pub const DEVICE_WORK_PER_GPU: f64 = 1.0e6;

// ============================================================================
// DISPLAY AND DEBUG CONSTANTS
// ============================================================================

/// Maximum vectors to print in debug display
pub const MAX_DISPLAY_VECTORS: usize = 5;

/// Maximum elements per vector in debug display
pub const MAX_DISPLAY_ELEMENTS_PER_VECTOR: usize = 5;
