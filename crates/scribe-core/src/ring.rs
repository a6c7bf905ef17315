// SPDX-License-Identifier: Apache-2.0
//! Byte-capacity-bounded FIFO of serialized trace entries.
//!
//! The ring stores [`EncodedEntry`] values in arrival order and tracks the
//! total payload bytes it holds. Appending past capacity evicts from the
//! head, oldest first, handing each evicted entry to a caller-supplied hook
//! before it is dropped. The hook is how evicted history reaches the
//! starting-state fold; the ring itself knows nothing about entry contents.
//!
//! # Invariants
//! - Entries are pushed in strictly ascending sequence order by the
//!   recorder, so storage order equals sequence order.
//! - Every entry that leaves the ring passes through the eviction hook
//!   exactly once, in pop order. No entry is silently dropped.
//! - `used()` equals the sum of `size_bytes()` over retained entries.

use std::collections::VecDeque;

use tracing::trace;

use crate::entry::EncodedEntry;
use crate::error::TraceError;

/// Fixed-byte-capacity FIFO store of serialized entries.
#[derive(Debug)]
pub struct RingBuffer {
    entries: VecDeque<EncodedEntry>,
    used: usize,
    capacity: usize,
}

impl RingBuffer {
    /// Constructs an empty ring bounded to `capacity_bytes`.
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidCapacity`] when `capacity_bytes` is
    /// zero. Capacity must be a positive byte count; it is never clamped.
    pub fn new(capacity_bytes: usize) -> Result<Self, TraceError> {
        if capacity_bytes == 0 {
            return Err(TraceError::InvalidCapacity {
                bytes: capacity_bytes,
            });
        }
        Ok(Self {
            entries: VecDeque::new(),
            used: 0,
            capacity: capacity_bytes,
        })
    }

    /// Current payload byte usage.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Configured capacity bound in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the oldest retained entry, or `None` when the ring is empty.
    ///
    /// Callers that still follow the legacy guard discipline can check
    /// `used() == 0` first; the `Option` makes the precondition explicit.
    #[must_use]
    pub fn front(&self) -> Option<&EncodedEntry> {
        self.entries.front()
    }

    /// Iterates retained entries oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &EncodedEntry> + '_ {
        self.entries.iter()
    }

    /// Appends `entry` at the tail, evicting from the head until it fits.
    ///
    /// Each evicted entry is handed to `on_evict` in pop order before the
    /// append happens. An entry larger than the whole capacity still lands
    /// after the ring empties itself: the capacity bound governs retention,
    /// not admission, so no commit is ever lost without being folded.
    ///
    /// # Errors
    /// Propagates the first error returned by `on_evict`; the failing entry
    /// and everything younger stay un-evicted and `entry` is not appended.
    pub fn push<F>(&mut self, entry: EncodedEntry, on_evict: F) -> Result<(), TraceError>
    where
        F: FnMut(EncodedEntry) -> Result<(), TraceError>,
    {
        let size = entry.size_bytes();
        self.evict_until_fits(size, on_evict)?;
        self.used += size;
        self.entries.push_back(entry);
        Ok(())
    }

    /// Rebounds the ring to `capacity_bytes`.
    ///
    /// Shrinking below current usage immediately evicts from the head,
    /// through `on_evict`, until usage is back within the new bound.
    ///
    /// # Errors
    /// Returns [`TraceError::InvalidCapacity`] when `capacity_bytes` is
    /// zero (the previous capacity is kept), or the first error returned by
    /// `on_evict` while draining down to the new bound.
    pub fn set_capacity<F>(&mut self, capacity_bytes: usize, on_evict: F) -> Result<(), TraceError>
    where
        F: FnMut(EncodedEntry) -> Result<(), TraceError>,
    {
        if capacity_bytes == 0 {
            return Err(TraceError::InvalidCapacity {
                bytes: capacity_bytes,
            });
        }
        self.capacity = capacity_bytes;
        self.evict_until_fits(0, on_evict)
    }

    /// Drops every retained entry without invoking any hook.
    ///
    /// Used by recorder teardown, where the consolidated history is being
    /// discarded wholesale and folding would be wasted work.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.used = 0;
    }

    fn evict_until_fits<F>(&mut self, incoming: usize, mut on_evict: F) -> Result<(), TraceError>
    where
        F: FnMut(EncodedEntry) -> Result<(), TraceError>,
    {
        while self.used + incoming > self.capacity {
            let Some(evicted) = self.entries.pop_front() else {
                break;
            };
            self.used -= evicted.size_bytes();
            trace!(seq = %evicted.seq, bytes = evicted.size_bytes(), "evicting trace entry");
            on_evict(evicted)?;
        }
        Ok(())
    }
}
