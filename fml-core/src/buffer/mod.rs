//! The field buffer engine.
//!
//! A [`FieldBuffer`] is either *null* (it owns no arena block) or
//! *allocated*. An allocated buffer is *indexed* while its entries are kept
//! sorted by identifier and a sparse index is current, and
//! *unindexed* after a fast-path [`append`](FieldBuffer::append) or an
//! explicit [`drop_index`](FieldBuffer::drop_index).
//!
//! ```text
//!            alloc / add / append / set          append / drop_index
//!   Null ──────────────────────────────▶ Indexed ◀────────────────────▶ Unindexed
//!    ▲                                      │        build_index            │
//!    └──────────────── free / take ─────────┴───────────────────────────────┘
//! ```
//!
//! Writes that run out of room grow the block to
//! `max(2 × capacity, used + needed)` and retry once. Every mutating call
//! checks for space before touching the region, so a failed call leaves
//! the buffer exactly as it was.

mod algebra;
pub(crate) mod entry;
mod index;
mod ops;
mod text;
mod transport;

pub use entry::MAX_NESTING_DEPTH;
pub use index::DEFAULT_INDEX_INTERVAL;
pub use transport::{ExportMode, FRAME_MAGIC, FRAME_VERSION};

pub(crate) use ops::whole_match_regex;

use crate::arena::{
    ArenaAllocator, ArenaBlock, BufferHeader, HEADER_SIZE, default_arena,
};
use crate::catalog::Catalog;
use crate::error::{FmlError, Result};
use crate::types::{FieldType, Narrow, Wide, Width};
use entry::{Entries, decode_value, nesting_depth, validate_region};
use index::{Index, sort_region};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A narrow (16-bit identifier) field buffer.
pub type Fml16 = FieldBuffer<Narrow>;

/// A wide (32-bit identifier) field buffer.
pub type Fml32 = FieldBuffer<Wide>;

/// An arena block together with the arena it must be returned to.
struct Storage {
    arena: Arc<dyn ArenaAllocator>,
    block: ArenaBlock,
}

impl Drop for Storage {
    fn drop(&mut self) {
        let block = std::mem::replace(&mut self.block, ArenaBlock::detached());
        self.arena.release(block);
    }
}

/// A self-describing, multiset-valued record of typed fields.
pub struct FieldBuffer<W: Width> {
    storage: Option<Storage>,
    index: Option<Index<W>>,
    interval: usize,
}

impl<W: Width> FieldBuffer<W> {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// A null buffer. It owns nothing and needs no cleanup.
    pub fn new() -> Self {
        Self {
            storage: None,
            index: None,
            interval: DEFAULT_INDEX_INTERVAL,
        }
    }

    /// Allocate room for `entries` entries holding `value_bytes` bytes of
    /// values in total.
    pub fn alloc(entries: usize, value_bytes: usize) -> Result<Self> {
        Self::with_capacity(Catalog::<W>::bytes_needed(entries, value_bytes))
    }

    /// Allocate a buffer of `bytes` total bytes from the default arena.
    pub fn with_capacity(bytes: usize) -> Result<Self> {
        Self::alloc_in(default_arena(), bytes)
    }

    /// Allocate a buffer of `bytes` total bytes from `arena`.
    pub fn alloc_in(arena: Arc<dyn ArenaAllocator>, bytes: usize) -> Result<Self> {
        let size = bytes.max(HEADER_SIZE);
        if size > u32::MAX as usize {
            return Err(FmlError::ArenaCapacity {
                requested: size,
                limit: u32::MAX as usize,
            });
        }

        let mut block = arena.allocate(W::BUFFER_KIND, "", size)?;
        let capacity = block.capacity();
        BufferHeader::new(W::WORD_BYTES as u8, capacity as u32).write_to(block.bytes_mut());

        let mut buf = Self {
            storage: Some(Storage { arena, block }),
            index: None,
            interval: DEFAULT_INDEX_INTERVAL,
        };
        buf.index = Some(Index::build(buf.region(), buf.interval));
        Ok(buf)
    }

    /// Allocate a buffer of `arena`'s initial capacity.
    pub fn alloc_initial_in(arena: Arc<dyn ArenaAllocator>) -> Result<Self> {
        let size = arena.initial_capacity();
        Self::alloc_in(arena, size)
    }

    /// Resize the allocation to `bytes`. A null buffer is allocated.
    ///
    /// Shrinking below the bytes in use is refused with `SpaceExhausted`.
    pub fn realloc(&mut self, bytes: usize) -> Result<()> {
        let Some(storage) = self.storage.as_mut() else {
            *self = Self::with_capacity(bytes)?;
            return Ok(());
        };

        let used = BufferHeader::read_used(storage.block.bytes());
        let size = bytes.max(HEADER_SIZE);
        if size < used {
            return Err(FmlError::SpaceExhausted {
                needed: used,
                available: size,
            });
        }

        let before = storage.block.capacity();
        if size > before {
            storage.arena.grow(&mut storage.block, size)?;
        } else if size < before {
            storage.arena.shrink(&mut storage.block, size);
        }
        let capacity = storage.block.capacity();
        BufferHeader::write_capacity(storage.block.bytes_mut(), capacity);
        tracing::debug!(from = before, to = capacity, used, "Reallocated field buffer");
        Ok(())
    }

    /// Release the allocation, leaving the buffer null.
    pub fn free(&mut self) {
        self.storage = None;
        self.index = None;
    }

    /// Move the contents out, leaving this buffer null.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Remove every entry but keep the allocation.
    pub fn init(&mut self) -> Result<()> {
        let storage = self.storage_mut("init")?;
        let bytes = storage.block.bytes_mut();
        let used = BufferHeader::read_used(bytes);
        bytes[HEADER_SIZE..used].fill(0);
        BufferHeader::write_used(bytes, HEADER_SIZE);
        BufferHeader::write_indexed(bytes, true);
        self.index = Some(Index::build(self.region(), self.interval));
        Ok(())
    }

    /// A deep copy in a fresh block of the same arena, re-indexed.
    pub fn try_clone(&self) -> Result<Self> {
        if self.is_null() {
            return Ok(Self::new());
        }
        let mut copy = self.snapshot()?;
        copy.build_index(self.interval)?;
        Ok(copy)
    }

    /// A byte-for-byte copy in a fresh block of the same arena, keeping the
    /// physical order and index state.
    pub(crate) fn snapshot(&self) -> Result<Self> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(Self {
                storage: None,
                index: None,
                interval: self.interval,
            });
        };

        let mut block = storage.arena.allocate(
            storage.block.kind(),
            storage.block.subtype(),
            storage.block.capacity(),
        )?;
        let used = BufferHeader::read_used(storage.block.bytes());
        block.bytes_mut()[..used].copy_from_slice(&storage.block.bytes()[..used]);
        let capacity = block.capacity();
        BufferHeader::write_capacity(block.bytes_mut(), capacity);

        Ok(Self {
            storage: Some(Storage {
                arena: Arc::clone(&storage.arena),
                block,
            }),
            index: self.index.clone(),
            interval: self.interval,
        })
    }

    /// Rebuild a buffer from a validated byte region (header and entries).
    pub(crate) fn from_region(bytes: &[u8]) -> Result<Self> {
        let header = BufferHeader::from_bytes(bytes)?;
        header.validate(W::WORD_BYTES as u8)?;
        if header.used as usize != bytes.len() {
            return Err(FmlError::corrupt(
                12,
                format!(
                    "header records {} bytes used, region has {}",
                    header.used,
                    bytes.len()
                ),
            ));
        }
        let depth = nesting_depth::<W>(bytes);
        if depth > MAX_NESTING_DEPTH {
            return Err(FmlError::corrupt(
                HEADER_SIZE,
                format!(
                    "buffers nested more than {} levels deep",
                    MAX_NESTING_DEPTH
                ),
            ));
        }
        validate_region::<W>(bytes)?;

        let mut buf = Self::with_capacity(bytes.len())?;
        let storage = buf.storage_mut("import")?;
        storage.block.bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        let capacity = storage.block.capacity();
        BufferHeader::write_capacity(storage.block.bytes_mut(), capacity);
        buf.build_index(DEFAULT_INDEX_INTERVAL)?;
        Ok(buf)
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Whether the buffer owns no allocation.
    pub fn is_null(&self) -> bool {
        self.storage.is_none()
    }

    /// Total bytes of the allocation; zero when null.
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().map_or(0, |s| s.block.capacity())
    }

    /// Bytes in use, header included; zero when null.
    pub fn used(&self) -> usize {
        self.region().len()
    }

    /// Bytes still free.
    pub fn unused(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Total number of occurrences of all fields.
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// Whether the buffer holds no entries (null buffers included).
    pub fn is_empty(&self) -> bool {
        self.used() <= HEADER_SIZE
    }

    /// Whether random-access operations are currently valid.
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Interval of the current index, if one is built.
    pub fn index_interval(&self) -> Option<usize> {
        self.index.as_ref().map(Index::interval)
    }

    /// Sort the entries and build a sparse index sampling every
    /// `interval` entries.
    pub fn build_index(&mut self, interval: usize) -> Result<()> {
        let interval = interval.max(1);
        let storage = self.storage_mut("build_index")?;
        let bytes = storage.block.bytes_mut();
        let used = BufferHeader::read_used(bytes);
        let reordered = sort_region::<W>(&mut bytes[..used]);
        BufferHeader::write_indexed(bytes, true);

        self.interval = interval;
        let index = Index::build(self.region(), interval);
        tracing::debug!(
            width = W::NAME,
            interval,
            samples = index.samples(),
            reordered,
            "Built field buffer index"
        );
        self.index = Some(index);
        Ok(())
    }

    /// Drop the index; random access fails until it is rebuilt.
    pub fn drop_index(&mut self) {
        self.index = None;
        if let Some(storage) = self.storage.as_mut() {
            BufferHeader::write_indexed(storage.block.bytes_mut(), false);
        }
    }

    // =========================================================================
    // Region primitives
    // =========================================================================

    /// The bytes in use (`[..used]`); empty when null.
    pub(crate) fn region(&self) -> &[u8] {
        match self.storage.as_ref() {
            Some(s) => {
                let bytes = s.block.bytes();
                &bytes[..BufferHeader::read_used(bytes)]
            }
            None => &[],
        }
    }

    pub(crate) fn entries(&self) -> Entries<'_, W> {
        Entries::new(self.region(), HEADER_SIZE)
    }

    /// Standalone copy of the region with `capacity == used`; empty when null.
    pub(crate) fn region_bytes(&self) -> Vec<u8> {
        let mut bytes = self.region().to_vec();
        if !bytes.is_empty() {
            let used = bytes.len();
            BufferHeader::write_capacity(&mut bytes, used);
        }
        bytes
    }

    fn storage_mut(&mut self, operation: &'static str) -> Result<&mut Storage> {
        self.storage
            .as_mut()
            .ok_or(FmlError::BufferNull { operation })
    }

    pub(crate) fn check_allocated(&self, operation: &'static str) -> Result<()> {
        match self.storage {
            Some(_) => Ok(()),
            None => Err(FmlError::BufferNull { operation }),
        }
    }

    fn require_index(&self, operation: &'static str) -> Result<&Index<W>> {
        self.check_allocated(operation)?;
        self.index
            .as_ref()
            .ok_or(FmlError::NotIndexed { operation })
    }

    /// Replace `range` of the region with `replacement`, shifting the tail.
    ///
    /// Fails with `SpaceExhausted` before touching anything if the result
    /// would not fit.
    fn splice(&mut self, range: Range<usize>, replacement: &[u8]) -> Result<()> {
        let storage = self.storage_mut("write")?;
        let bytes = storage.block.bytes_mut();
        let capacity = bytes.len();
        let used = BufferHeader::read_used(bytes);
        let new_used = used - range.len() + replacement.len();
        if new_used > capacity {
            return Err(FmlError::SpaceExhausted {
                needed: replacement.len() - range.len(),
                available: capacity - used,
            });
        }

        let start = range.start;
        bytes.copy_within(range.end..used, start + replacement.len());
        bytes[start..start + replacement.len()].copy_from_slice(replacement);
        if new_used < used {
            bytes[new_used..used].fill(0);
        }
        BufferHeader::write_used(bytes, new_used);
        Ok(())
    }

    /// Replace every entry with `body` (already-encoded entries) and index
    /// the result. Grows once when `body` does not fit.
    fn install(&mut self, body: &[u8]) -> Result<()> {
        let needed = HEADER_SIZE + body.len();
        let used = self.used();
        if needed > self.capacity() {
            self.grow_for(needed - used)?;
        }

        let storage = self.storage_mut("write")?;
        let bytes = storage.block.bytes_mut();
        bytes[HEADER_SIZE..needed].copy_from_slice(body);
        if needed < used {
            bytes[needed..used].fill(0);
        }
        BufferHeader::write_used(bytes, needed);
        self.build_index(self.interval)
    }

    fn grow_for(&mut self, needed: usize) -> Result<()> {
        let storage = self.storage_mut("grow")?;
        let before = storage.block.capacity();
        let used = BufferHeader::read_used(storage.block.bytes());
        let target = (before * 2).max(used + needed);

        storage.arena.grow(&mut storage.block, target)?;
        let capacity = storage.block.capacity();
        BufferHeader::write_capacity(storage.block.bytes_mut(), capacity);
        tracing::debug!(
            kind = %W::BUFFER_KIND,
            from = before,
            to = capacity,
            needed,
            "Grew field buffer"
        );
        Ok(())
    }

    /// Run a write; on `SpaceExhausted` grow and run it exactly once more.
    fn with_growth<T>(
        &mut self,
        operation: &'static str,
        mut write: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<T> {
        match write(&mut *self) {
            Err(FmlError::SpaceExhausted { needed, .. }) => {
                self.grow_for(needed).inspect_err(|e| {
                    tracing::warn!(operation, error = %e, "Field buffer growth failed");
                })?;
                write(&mut *self).inspect_err(|e| {
                    if e.is_retriable() {
                        tracing::warn!(operation, error = %e, "Field buffer still full after growth");
                    }
                })
            }
            other => other,
        }
    }

    /// Allocate from the default arena if null; reports whether it did.
    fn ensure_allocated(&mut self) -> Result<bool> {
        if self.storage.is_some() {
            return Ok(false);
        }
        *self = Self::alloc_initial_in(default_arena())?;
        Ok(true)
    }

    /// Resample the index after a write that kept entries sorted.
    fn refresh_index(&mut self) {
        if self.index.is_some() {
            self.index = Some(Index::build(self.region(), self.interval));
        }
    }

    /// Entries stably sorted by identifier.
    fn logical_entries(&self) -> Vec<entry::RawEntry<W>> {
        let mut entries: Vec<_> = self.entries().collect();
        entries.sort_by_key(|e| e.id);
        entries
    }
}

impl<W: Width> Default for FieldBuffer<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy. A copy the arena refuses to allocate comes back null; use
/// [`FieldBuffer::try_clone`] to observe the failure.
impl<W: Width> Clone for FieldBuffer<W> {
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Field buffer copy failed");
            Self::new()
        })
    }
}

/// Buffers are equal when both are null, or both hold the same
/// occurrences of the same fields, whatever their physical order.
impl<W: Width> PartialEq for FieldBuffer<W> {
    fn eq(&self, other: &Self) -> bool {
        if self.is_null() || other.is_null() {
            return self.is_null() && other.is_null();
        }

        let (a, b) = (self.logical_entries(), other.logical_entries());
        if a.len() != b.len() {
            return false;
        }
        let (ra, rb) = (self.region(), other.region());
        a.iter().zip(&b).all(|(x, y)| {
            if x.id != y.id {
                return false;
            }
            let (va, vb) = (&ra[x.value_range()], &rb[y.value_range()]);
            if x.id.field_type() == FieldType::Fml {
                // Nested buffers compare logically too.
                decode_value(FieldType::Fml, va, 0).ok() == decode_value(FieldType::Fml, vb, 0).ok()
            } else {
                va == vb
            }
        })
    }
}

impl<W: Width> fmt::Debug for FieldBuffer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "FieldBuffer<{}>(null)", W::NAME);
        }
        f.debug_struct("FieldBuffer")
            .field("width", &W::NAME)
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .field("entries", &self.len())
            .field("indexed", &self.is_indexed())
            .finish()
    }
}
