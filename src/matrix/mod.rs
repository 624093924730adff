// Matrix data structures and operations

pub mod component;
pub mod conversion;
pub mod reference;
pub mod sparse;
pub mod types;
mod wait;

pub use component::{Component, Ownership};
pub use reference::{
    reference_apply, reference_ewise_union, reference_reduce, reference_rowscale, reference_select, Tuples,
};
pub use sparse::{flip, is_zombie, unflip, Format, PendingTuple, SparseMatrix};
pub use types::{Element, TypeCode, TypeDesc};
