//! Allocation strategies.
//!
//! Every growable buffer the crate creates (the shared element data, the
//! per-row and per-property offset tables, builder buffers) is obtained
//! through an [`Allocator`] that the caller passes in explicitly. There is no
//! global allocator state; two loads running with different allocators never
//! affect each other. Memory is returned by dropping the owning `Vec`.

use std::{cell::Cell, mem};

use crate::error::{Error, Result};


/// A strategy to grow buffers, failing gracefully instead of aborting.
pub trait Allocator {
    /// Makes sure `buf` can hold at least `additional` more items without
    /// reallocating. On failure `buf` is left untouched.
    fn reserve<T>(&self, buf: &mut Vec<T>, additional: usize) -> Result<()>;

    /// Returns a vector of `len` default (zero) values.
    fn zeroed<T: Clone + Default>(&self, len: usize) -> Result<Vec<T>> {
        let mut out = Vec::new();
        self.reserve(&mut out, len)?;
        out.resize(len, T::default());
        Ok(out)
    }
}

fn byte_size<T>(count: usize) -> u64 {
    (count as u64).saturating_mul(mem::size_of::<T>() as u64)
}

/// The default allocator: the global heap, with allocation failures reported
/// as [`Error::AllocationFailed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Heap;

impl Allocator for Heap {
    fn reserve<T>(&self, buf: &mut Vec<T>, additional: usize) -> Result<()> {
        buf.try_reserve_exact(additional)
            .map_err(|_| Error::AllocationFailed(byte_size::<T>(additional)))
    }
}

/// An allocator that hands out at most `limit` bytes in total and fails
/// afterwards. Useful to bound the memory a load of untrusted input may use.
#[derive(Debug)]
pub struct Budget {
    limit: u64,
    used: Cell<u64>,
}

impl Budget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: Cell::new(0),
        }
    }

    /// Number of bytes handed out so far.
    pub fn used(&self) -> u64 {
        self.used.get()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl Allocator for Budget {
    fn reserve<T>(&self, buf: &mut Vec<T>, additional: usize) -> Result<()> {
        // Only growth beyond the current capacity is charged.
        let wanted = buf.len().saturating_add(additional);
        let growth = byte_size::<T>(wanted.saturating_sub(buf.capacity()));

        let used = self.used.get().checked_add(growth)
            .filter(|&total| total <= self.limit)
            .ok_or(Error::AllocationFailed(growth))?;

        Heap.reserve(buf, additional)?;
        self.used.set(used);
        Ok(())
    }
}
