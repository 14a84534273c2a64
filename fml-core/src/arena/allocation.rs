//! Allocation tracking for arena accounting.
//!
//! Tracks every live block handed out by an arena so leaks and peak usage
//! can be observed.

use super::heap::{ArenaHandle, BufferKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// An entry tracking a single live block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationEntry {
    /// The block handle.
    pub handle: ArenaHandle,
    /// The buffer kind the block was allocated for.
    pub kind: BufferKind,
    /// Current size of the block in bytes.
    pub size: usize,
    /// How many times the block has been resized.
    pub resizes: u32,
}

/// Tracks all live blocks of an arena.
pub struct AllocationTracker {
    /// Map from handle to allocation entry.
    allocations: RwLock<HashMap<ArenaHandle, AllocationEntry>>,
    /// Bytes currently held by live blocks.
    live_bytes: AtomicU64,
    /// Highest value `live_bytes` has reached.
    peak_bytes: AtomicU64,
    /// Blocks ever allocated.
    total_allocations: AtomicU64,
}

impl AllocationTracker {
    /// Create a new allocation tracker.
    pub fn new() -> Self {
        Self {
            allocations: RwLock::new(HashMap::new()),
            live_bytes: AtomicU64::new(0),
            peak_bytes: AtomicU64::new(0),
            total_allocations: AtomicU64::new(0),
        }
    }

    /// Record a new block.
    pub fn record_allocation(&self, handle: ArenaHandle, kind: BufferKind, size: usize) {
        let entry = AllocationEntry {
            handle,
            kind,
            size,
            resizes: 0,
        };
        self.allocations.write().insert(handle, entry);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        self.add_live(size as u64);
    }

    /// Record a block changing size.
    pub fn record_resize(&self, handle: ArenaHandle, new_size: usize) {
        let mut allocs = self.allocations.write();
        if let Some(entry) = allocs.get_mut(&handle) {
            let old = entry.size as u64;
            entry.size = new_size;
            entry.resizes += 1;
            drop(allocs);
            self.live_bytes.fetch_sub(old, Ordering::Relaxed);
            self.add_live(new_size as u64);
        }
    }

    /// Record a block being released.
    pub fn record_release(&self, handle: ArenaHandle) {
        if let Some(entry) = self.allocations.write().remove(&handle) {
            self.live_bytes
                .fetch_sub(entry.size as u64, Ordering::Relaxed);
        }
    }

    fn add_live(&self, size: u64) {
        let now = self.live_bytes.fetch_add(size, Ordering::Relaxed) + size;
        self.peak_bytes.fetch_max(now, Ordering::Relaxed);
    }

    /// Check if a handle is live.
    pub fn is_live(&self, handle: ArenaHandle) -> bool {
        self.allocations.read().contains_key(&handle)
    }

    /// Look up a live block.
    pub fn get(&self, handle: ArenaHandle) -> Option<AllocationEntry> {
        self.allocations.read().get(&handle).copied()
    }

    /// Number of live blocks.
    pub fn live_count(&self) -> usize {
        self.allocations.read().len()
    }

    /// Bytes held by live blocks.
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Peak bytes held at once.
    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Blocks ever allocated.
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations.load(Ordering::Relaxed)
    }
}

impl Default for AllocationTracker {
    fn default() -> Self {
        Self::new()
    }
}
