//! Growable single-owner storage for field buffers.
//!
//! Every allocated field buffer owns exactly one arena block. The block
//! begins with a fixed header followed by the entry region:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (16 bytes: magic, word width, flags, capacity, used)  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Entries                                                      │
//! │ ┌──────────────────────────────────────────────────────────┐ │
//! │ │ [id: u16|u32][len: u16|u32][value: len bytes]            │ │
//! │ ├──────────────────────────────────────────────────────────┤ │
//! │ │ ...                                                      │ │
//! │ └──────────────────────────────────────────────────────────┘ │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Free space up to capacity                                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocation goes through the [`ArenaAllocator`] trait. [`HeapArena`] is
//! the default provider; [`default_arena`] returns the process-wide one.

mod allocation;
mod header;
mod heap;

pub use allocation::{AllocationEntry, AllocationTracker};
pub use header::{BUFFER_MAGIC, BufferHeader, FLAG_INDEXED, HEADER_SIZE};
pub use heap::{
    ARENA_INITIAL_ENV, ARENA_MAX_ENV, ArenaAllocator, ArenaBlock, ArenaConfig, ArenaHandle, BlockInfo, BufferKind,
    DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_CAPACITY, HeapArena, default_arena,
};
