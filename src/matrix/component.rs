//! Reference-counted array components of a matrix
//!
//! Each array of a matrix (offsets, hyperlist, indices, bitmap, values) is a
//! [`Component`]. A component is either owned or a shallow view of another
//! matrix's array. Shallow components are never written in place: the first
//! write makes a private copy.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Whether a component's storage belongs to this matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Shallow,
}

pub struct Component<T> {
    data: Arc<Vec<T>>,
    ownership: Ownership,
}

impl<T> Component<T> {
    pub fn owned(data: Vec<T>) -> Self {
        Self {
            data: Arc::new(data),
            ownership: Ownership::Owned,
        }
    }

    /// A shallow view sharing this component's storage
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            ownership: Ownership::Shallow,
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_shallow(&self) -> bool {
        self.ownership == Ownership::Shallow
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Marks the component owned when nothing else shares its storage
    pub fn reclaim(&mut self) {
        if Arc::strong_count(&self.data) == 1 {
            self.ownership = Ownership::Owned;
        }
    }

    /// True when both components view the same storage
    pub fn shares_with(&self, other: &Component<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T: Clone> Component<T> {
    /// Mutable access, copying the storage first if it is shared
    pub fn make_mut(&mut self) -> &mut Vec<T> {
        self.ownership = Ownership::Owned;
        Arc::make_mut(&mut self.data)
    }

    /// Takes the storage out, copying only if it is still shared
    pub fn into_vec(self) -> Vec<T> {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<T> Deref for Component<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

/// Cloning a component is a deep copy; use [`Component::share`] for a view
impl<T: Clone> Clone for Component<T> {
    fn clone(&self) -> Self {
        Self::owned((*self.data).clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("len", &self.data.len())
            .field("ownership", &self.ownership)
            .finish()
    }
}
