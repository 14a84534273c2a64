//! Identifier width families.
//!
//! The narrow and wide families share one engine. They differ only in the
//! integer width of identifiers and lengths on the wire, the identifier bit
//! layout, and the set of value kinds they accept.

use super::ids::FieldType;
use crate::arena::BufferKind;
use crate::catalog::{Catalog, CatalogConfig};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::OnceLock;

/// A field-identifier width family.
pub trait Width:
    Copy + Clone + Debug + Default + PartialEq + Eq + Hash + PartialOrd + Ord + Send + Sync + 'static
{
    /// Short family name used in diagnostics.
    const NAME: &'static str;
    /// Bytes used on the wire for an identifier and for a value length.
    const WORD_BYTES: usize;
    /// Bit position of the type tag inside an identifier.
    const TYPE_SHIFT: u32;
    /// Largest field number; also the number mask.
    const MAX_NUMBER: u32;
    /// Environment variable listing this family's field-table files.
    const TABLES_ENV: &'static str;
    /// Buffer kind recorded on arena allocations and export frames.
    const BUFFER_KIND: BufferKind;

    /// Whether this family can declare fields of `field_type`.
    fn supports(field_type: FieldType) -> bool;

    /// The process-wide catalog for this family.
    fn catalog() -> &'static Catalog<Self>;

    /// Largest value length representable on the wire.
    fn max_value_len() -> usize {
        if Self::WORD_BYTES == 2 {
            u16::MAX as usize
        } else {
            u32::MAX as usize
        }
    }

    /// Read one identifier/length word.
    fn read_word(bytes: &[u8]) -> u32 {
        if Self::WORD_BYTES == 2 {
            LittleEndian::read_u16(bytes) as u32
        } else {
            LittleEndian::read_u32(bytes)
        }
    }

    /// Write one identifier/length word.
    fn write_word(bytes: &mut [u8], value: u32) {
        if Self::WORD_BYTES == 2 {
            LittleEndian::write_u16(bytes, value as u16);
        } else {
            LittleEndian::write_u32(bytes, value);
        }
    }
}

/// 16-bit identifiers: scalar, text and byte-array kinds only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Narrow;

/// 32-bit identifiers: every value kind including nested buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Wide;

impl Width for Narrow {
    const NAME: &'static str = "fml16";
    const WORD_BYTES: usize = 2;
    const TYPE_SHIFT: u32 = 13;
    const MAX_NUMBER: u32 = (1 << 13) - 1;
    const TABLES_ENV: &'static str = "FML_FIELD_TABLES";
    const BUFFER_KIND: BufferKind = BufferKind::Fml;

    fn supports(field_type: FieldType) -> bool {
        field_type.tag() <= FieldType::Int.tag()
    }

    fn catalog() -> &'static Catalog<Self> {
        static CATALOG: OnceLock<Catalog<Narrow>> = OnceLock::new();
        CATALOG.get_or_init(|| Catalog::new(CatalogConfig::from_env::<Narrow>()))
    }
}

impl Width for Wide {
    const NAME: &'static str = "fml32";
    const WORD_BYTES: usize = 4;
    const TYPE_SHIFT: u32 = 25;
    const MAX_NUMBER: u32 = (1 << 25) - 1;
    const TABLES_ENV: &'static str = "FML_FIELD_TABLES32";
    const BUFFER_KIND: BufferKind = BufferKind::Fml32;

    fn supports(_field_type: FieldType) -> bool {
        true
    }

    fn catalog() -> &'static Catalog<Self> {
        static CATALOG: OnceLock<Catalog<Wide>> = OnceLock::new();
        CATALOG.get_or_init(|| Catalog::new(CatalogConfig::from_env::<Wide>()))
    }
}
