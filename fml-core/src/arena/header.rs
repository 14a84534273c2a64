//! Field-buffer header structure.

use crate::error::{FmlError, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

/// Magic number at the start of every field buffer ("FMLB").
pub const BUFFER_MAGIC: u32 = 0x424C_4D46;

/// Fixed size of the buffer header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Header flag: entries are sorted by identifier and an index is valid.
pub const FLAG_INDEXED: u8 = 0x01;

const FLAGS_OFFSET: usize = 5;
const CAPACITY_OFFSET: usize = 8;
const USED_OFFSET: usize = 12;

/// Field-buffer header.
///
/// Stored at the start of every buffer's arena block. `used` counts the
/// header itself, so an empty buffer has `used == HEADER_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferHeader {
    /// Magic number for identification.
    pub magic: u32,
    /// Identifier/length word width in bytes (2 or 4).
    pub word_bytes: u8,
    /// State flags.
    pub flags: u8,
    /// Total capacity of the allocation.
    pub capacity: u32,
    /// Bytes in use, header included.
    pub used: u32,
}

impl BufferHeader {
    /// Create a header for an empty buffer.
    pub fn new(word_bytes: u8, capacity: u32) -> Self {
        Self {
            magic: BUFFER_MAGIC,
            word_bytes,
            flags: FLAG_INDEXED,
            capacity,
            used: HEADER_SIZE as u32,
        }
    }

    /// Validate the header against the expected word width.
    pub fn validate(&self, word_bytes: u8) -> Result<()> {
        if self.magic != BUFFER_MAGIC {
            return Err(FmlError::corrupt(0, "invalid magic number"));
        }
        if self.word_bytes != word_bytes {
            return Err(FmlError::corrupt(
                4,
                format!(
                    "word width {} does not match expected {}",
                    self.word_bytes, word_bytes
                ),
            ));
        }
        if (self.used as usize) < HEADER_SIZE {
            return Err(FmlError::corrupt(12, "used size smaller than header"));
        }
        if self.used > self.capacity {
            return Err(FmlError::corrupt(12, "used size exceeds capacity"));
        }
        Ok(())
    }

    /// Whether the indexed flag is set.
    pub fn is_indexed(&self) -> bool {
        self.flags & FLAG_INDEXED != 0
    }

    /// Read a header from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FmlError::corrupt(0, "buffer too small for header"));
        }
        Self::read(bytes).map_err(|e| FmlError::corrupt(0, e.to_string()))
    }

    fn read(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = io::Cursor::new(bytes);

        let magic = cursor.read_u32::<LittleEndian>()?;
        let word_bytes = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let capacity = cursor.read_u32::<LittleEndian>()?;
        let used = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            magic,
            word_bytes,
            flags,
            capacity,
            used,
        })
    }

    /// Write the header into the first `HEADER_SIZE` bytes of `out`.
    pub fn write_to(&self, out: &mut [u8]) {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        // Writes into a Vec cannot fail.
        let _ = self.write(&mut buf);
        debug_assert_eq!(buf.len(), HEADER_SIZE);
        out[..HEADER_SIZE].copy_from_slice(&buf);
    }

    fn write(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.write_u32::<LittleEndian>(self.magic)?;
        buf.write_u8(self.word_bytes)?;
        buf.write_u8(self.flags)?;
        buf.write_u16::<LittleEndian>(0)?;
        buf.write_u32::<LittleEndian>(self.capacity)?;
        buf.write_u32::<LittleEndian>(self.used)?;
        Ok(())
    }

    /// Bytes still free in the allocation.
    pub fn available_space(&self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }

    // In-place field access for a header already known to be valid.

    pub(crate) fn read_used(bytes: &[u8]) -> usize {
        LittleEndian::read_u32(&bytes[USED_OFFSET..]) as usize
    }

    pub(crate) fn write_used(bytes: &mut [u8], used: usize) {
        LittleEndian::write_u32(&mut bytes[USED_OFFSET..], used as u32);
    }

    pub(crate) fn write_capacity(bytes: &mut [u8], capacity: usize) {
        LittleEndian::write_u32(&mut bytes[CAPACITY_OFFSET..], capacity as u32);
    }

    pub(crate) fn write_indexed(bytes: &mut [u8], indexed: bool) {
        if indexed {
            bytes[FLAGS_OFFSET] |= FLAG_INDEXED;
        } else {
            bytes[FLAGS_OFFSET] &= !FLAG_INDEXED;
        }
    }
}
