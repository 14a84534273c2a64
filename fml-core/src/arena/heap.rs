//! Heap-backed arena allocator.

use super::allocation::AllocationTracker;
use crate::error::{FmlError, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Default initial block size: 1 KiB.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Default ceiling for a single block: 64 MiB.
pub const DEFAULT_MAX_CAPACITY: usize = 64 * 1024 * 1024;

/// Environment variable overriding the block ceiling (bytes).
pub const ARENA_MAX_ENV: &str = "FML_ARENA_MAX";

/// Environment variable overriding the initial block size (bytes).
pub const ARENA_INITIAL_ENV: &str = "FML_ARENA_INITIAL";

/// Type tag recorded with every allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Narrow field buffer.
    Fml,
    /// Wide field buffer.
    Fml32,
    /// Narrow fixed-layout record.
    View,
    /// Wide fixed-layout record.
    View32,
    /// Null-terminated text.
    String,
    /// Raw bytes.
    Carray,
}

impl BufferKind {
    /// Canonical name used in export frames.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fml => "FML",
            Self::Fml32 => "FML32",
            Self::View => "VIEW",
            Self::View32 => "VIEW32",
            Self::String => "STRING",
            Self::Carray => "CARRAY",
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BufferKind {
    type Err = FmlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FML" => Ok(Self::Fml),
            "FML32" => Ok(Self::Fml32),
            "VIEW" => Ok(Self::View),
            "VIEW32" => Ok(Self::View32),
            "STRING" => Ok(Self::String),
            "CARRAY" => Ok(Self::Carray),
            other => Err(FmlError::Transport {
                cause: format!("unknown buffer kind '{}'", other),
            }),
        }
    }
}

/// Opaque handle naming one arena block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaHandle(u64);

impl ArenaHandle {
    /// Create a handle from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArenaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block_{}", self.0)
    }
}

/// An exclusively owned block of arena memory.
///
/// Blocks are not `Clone`: copying a buffer allocates a fresh block.
pub struct ArenaBlock {
    handle: ArenaHandle,
    kind: BufferKind,
    subtype: String,
    bytes: Vec<u8>,
}

impl ArenaBlock {
    /// A block that belongs to no arena; used when moving a block out.
    pub(crate) fn detached() -> Self {
        Self {
            handle: ArenaHandle::new(0),
            kind: BufferKind::Carray,
            subtype: String::new(),
            bytes: Vec::new(),
        }
    }

    /// The block handle.
    pub fn handle(&self) -> ArenaHandle {
        self.handle
    }

    /// The buffer kind.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// The subtype name (empty for untyped kinds).
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Size of the block in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Read access to the block bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Write access to the block bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl fmt::Debug for ArenaBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaBlock")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("subtype", &self.subtype)
            .field("capacity", &self.bytes.len())
            .finish()
    }
}

/// What `inspect` reports about a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// The buffer kind.
    pub kind: BufferKind,
    /// The subtype name.
    pub subtype: String,
    /// Block size in bytes.
    pub capacity: usize,
}

/// The allocation contract field buffers are built on.
///
/// A block is owned by exactly one caller between `allocate` and `release`.
/// After `grow` or `shrink` callers must re-read `capacity()`.
pub trait ArenaAllocator: Send + Sync + fmt::Debug {
    /// Allocate a zeroed block of at least `min_size` bytes.
    fn allocate(&self, kind: BufferKind, subtype: &str, min_size: usize) -> Result<ArenaBlock>;

    /// Grow `block` to at least `new_min_size` bytes, keeping its contents.
    /// On failure the block is left untouched.
    fn grow(&self, block: &mut ArenaBlock, new_min_size: usize) -> Result<()>;

    /// Shrink `block` to exactly `new_size` bytes, truncating its contents.
    fn shrink(&self, block: &mut ArenaBlock, new_size: usize);

    /// Return a block to the arena.
    fn release(&self, block: ArenaBlock);

    /// Block size for buffers allocated without a size preference.
    fn initial_capacity(&self) -> usize {
        DEFAULT_INITIAL_CAPACITY
    }

    /// Report the type, subtype and capacity of a block.
    fn inspect(&self, block: &ArenaBlock) -> BlockInfo {
        BlockInfo {
            kind: block.kind(),
            subtype: block.subtype().to_string(),
            capacity: block.capacity(),
        }
    }
}

/// Configuration for the heap arena.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// Block size used when a caller has no size preference.
    pub initial_capacity: usize,
    /// Ceiling for a single block.
    pub max_capacity: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl ArenaConfig {
    /// Default configuration with `FML_ARENA_INITIAL` and `FML_ARENA_MAX`
    /// applied when set.
    pub fn from_env() -> Self {
        let bytes = |name: &str| std::env::var(name).ok().and_then(|v| v.parse().ok());
        let mut config = Self::default();
        if let Some(initial) = bytes(ARENA_INITIAL_ENV) {
            config = config.with_initial_capacity(initial);
        }
        if let Some(max) = bytes(ARENA_MAX_ENV) {
            config = config.with_max_capacity(max);
        }
        config
    }

    /// Set the initial block size.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the block ceiling.
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// An arena whose blocks live on the Rust heap.
pub struct HeapArena {
    config: ArenaConfig,
    tracker: AllocationTracker,
    next_handle: AtomicU64,
}

impl HeapArena {
    /// Create a heap arena.
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            tracker: AllocationTracker::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// The arena configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Allocation accounting for this arena.
    pub fn tracker(&self) -> &AllocationTracker {
        &self.tracker
    }

    fn check_limit(&self, requested: usize) -> Result<()> {
        if requested > self.config.max_capacity {
            return Err(FmlError::ArenaCapacity {
                requested,
                limit: self.config.max_capacity,
            });
        }
        Ok(())
    }
}

impl Default for HeapArena {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl fmt::Debug for HeapArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapArena")
            .field("config", &self.config)
            .field("live_blocks", &self.tracker.live_count())
            .field("live_bytes", &self.tracker.live_bytes())
            .finish()
    }
}

impl ArenaAllocator for HeapArena {
    fn initial_capacity(&self) -> usize {
        self.config.initial_capacity
    }

    fn allocate(&self, kind: BufferKind, subtype: &str, min_size: usize) -> Result<ArenaBlock> {
        self.check_limit(min_size)?;
        let handle = ArenaHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.tracker.record_allocation(handle, kind, min_size);
        tracing::trace!(%handle, %kind, size = min_size, "Allocated arena block");
        Ok(ArenaBlock {
            handle,
            kind,
            subtype: subtype.to_string(),
            bytes: vec![0u8; min_size],
        })
    }

    fn grow(&self, block: &mut ArenaBlock, new_min_size: usize) -> Result<()> {
        if new_min_size <= block.capacity() {
            return Ok(());
        }
        self.check_limit(new_min_size)?;
        block.bytes.resize(new_min_size, 0);
        self.tracker.record_resize(block.handle, new_min_size);
        tracing::trace!(handle = %block.handle, size = new_min_size, "Grew arena block");
        Ok(())
    }

    fn shrink(&self, block: &mut ArenaBlock, new_size: usize) {
        if new_size >= block.capacity() {
            return;
        }
        block.bytes.truncate(new_size);
        block.bytes.shrink_to_fit();
        self.tracker.record_resize(block.handle, new_size);
    }

    fn release(&self, block: ArenaBlock) {
        self.tracker.record_release(block.handle);
    }
}

/// The process-wide default arena.
pub fn default_arena() -> Arc<dyn ArenaAllocator> {
    static DEFAULT: OnceLock<Arc<HeapArena>> = OnceLock::new();
    let arena = DEFAULT.get_or_init(|| Arc::new(HeapArena::new(ArenaConfig::from_env())));
    Arc::clone(arena) as Arc<dyn ArenaAllocator>
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_release() {
        let arena = HeapArena::default();
        let block = arena.allocate(BufferKind::Fml32, "", 256).unwrap();

        assert_eq!(block.capacity(), 256);
        assert!(block.bytes().iter().all(|&b| b == 0));
        assert_eq!(arena.tracker().live_count(), 1);

        arena.release(block);
        assert_eq!(arena.tracker().live_count(), 0);
    }

    #[test]
    fn grow_keeps_contents() {
        let arena = HeapArena::default();
        let mut block = arena.allocate(BufferKind::Carray, "", 4).unwrap();
        block.bytes_mut().copy_from_slice(b"abcd");

        arena.grow(&mut block, 16).unwrap();
        assert_eq!(block.capacity(), 16);
        assert_eq!(&block.bytes()[..4], b"abcd");
        assert_eq!(arena.tracker().live_bytes(), 16);
    }

    #[test]
    fn grow_past_limit_leaves_block_untouched() {
        let arena = HeapArena::new(ArenaConfig::default().with_max_capacity(64));
        let mut block = arena.allocate(BufferKind::Fml32, "", 32).unwrap();

        let err = arena.grow(&mut block, 128).unwrap_err();
        assert!(matches!(err, FmlError::ArenaCapacity { limit: 64, .. }));
        assert_eq!(block.capacity(), 32);
    }

    #[test]
    fn initial_capacity_follows_config() {
        let arena = HeapArena::new(ArenaConfig::default().with_initial_capacity(96));
        assert_eq!(arena.initial_capacity(), 96);
        assert_eq!(HeapArena::default().initial_capacity(), DEFAULT_INITIAL_CAPACITY);
    }

    #[test]
    fn inspect_reports_kind_and_subtype() {
        let arena = HeapArena::default();
        let block = arena.allocate(BufferKind::View32, "order", 40).unwrap();
        let info = arena.inspect(&block);
        assert_eq!(info.kind, BufferKind::View32);
        assert_eq!(info.subtype, "order");
        assert_eq!(info.capacity, 40);
    }

    #[test]
    fn buffer_kind_names_round_trip() {
        for kind in [
            BufferKind::Fml,
            BufferKind::Fml32,
            BufferKind::View,
            BufferKind::View32,
            BufferKind::String,
            BufferKind::Carray,
        ] {
            assert_eq!(kind.as_str().parse::<BufferKind>().unwrap(), kind);
        }
        assert!("XML".parse::<BufferKind>().is_err());
    }
}
