//! # sparsejit: JIT-specialized kernels for compressed sparse matrices
//!
//! sparsejit runs operations on sparse matrices either through C kernels
//! generated and compiled at run time for the exact problem at hand, or
//! through generic Rust kernels when no compiled kernel can be had.
//!
//! ## Overview
//!
//! The library is built around a few components:
//!
//! 1. **Matrix descriptor** ([`SparseMatrix`]): one matrix type stored as
//!    sparse, hypersparse, bitmap or full, by row or by column, with iso
//!    values, zombies (deleted entries awaiting cleanup), pending insertions
//!    and copy-on-write components shared between matrices.
//!
//! 2. **JIT pipeline** ([`jit`]): problems are encoded and hashed, looked up
//!    in a kernel table, loaded from the on-disk kernel cache or compiled by
//!    an external C compiler. Failures fall back to the generic kernels.
//!
//! 3. **Task slicer** ([`slice`]): divides the entries or vectors of a
//!    matrix into balanced tasks for the rayon pool.
//!
//! 4. **Selector** ([`select`]): keeps the entries of a matrix that satisfy
//!    a positional, value or user predicate.
//!
//! 5. **Kernel families** ([`kernels`]): apply, element-wise on full
//!    matrices, row scaling and reduction.
//!
//! ## Usage
//!
//! Selecting entries:
//!
//! ```
//! use sparsejit::{select, IndexUnaryOp, SparseMatrix};
//!
//! let a = SparseMatrix::from_triplets(3, 3, &[(0, 0, 1.0), (1, 0, 2.0), (2, 2, 3.0)]).unwrap();
//! let lower = select(&a, &IndexUnaryOp::Tril(-1), false).unwrap();
//! assert_eq!(lower.extract_tuples(), vec![(1, 0, 2.0)]);
//! ```
//!
//! Running a kernel family without the JIT:
//!
//! ```
//! use sparsejit::{BinaryOpcode, Context, Monoid, SparseMatrix};
//!
//! let a = SparseMatrix::from_triplets(2, 2, &[(0, 0, 3i64), (1, 1, 4)]).unwrap();
//! let ctx = Context::generic_only();
//! let sum = ctx.reduce(&a, &Monoid::builtin(BinaryOpcode::Plus).unwrap()).unwrap();
//! assert_eq!(sum, 7);
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod jit;
pub mod kernels;
pub mod matrix;
pub mod offload;
pub mod ops;
pub mod parallel;
pub mod select;
pub mod slice;
pub mod utils;

// Re-export primary components
pub use config::{JitConfig, JitControl, SystemParameters};
pub use error::{Error, Result};
pub use jit::{Context, JitRuntime, JitStatsSnapshot};
pub use matrix::{Element, Format, SparseMatrix, TypeCode, TypeDesc};
pub use offload::{CostModelAdvisor, OffloadAdvisor, OperandSummary};
pub use ops::{BinaryOp, BinaryOpcode, IndexUnaryOp, Monoid, UnaryOp, UnaryOpcode};
pub use select::{select, select_in_place, select_in_place_with, select_with};
pub use utils::{from_dense, from_sprs, to_dense, to_sprs};

/// Version information for the sparsejit library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
