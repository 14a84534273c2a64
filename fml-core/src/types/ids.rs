//! Field identifiers and value-type tags.

use super::width::Width;
use crate::error::{FmlError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// The closed set of value kinds a field can be declared with.
///
/// The discriminant is the type tag packed into the high bits of a
/// [`FieldId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FieldType {
    /// Signed 16-bit integer.
    Short = 0,
    /// Signed 64-bit integer.
    Long = 1,
    /// Single 8-bit character.
    Char = 2,
    /// 32-bit float.
    Float = 3,
    /// 64-bit float.
    Double = 4,
    /// Null-terminated text.
    String = 5,
    /// Raw byte array.
    Carray = 6,
    /// Signed 32-bit integer.
    Int = 7,
    /// Opaque pointer.
    Ptr = 9,
    /// Nested wide field buffer.
    #[serde(rename = "fml32")]
    Fml = 10,
    /// Embedded fixed-layout record.
    #[serde(rename = "view32")]
    View = 11,
    /// Packed multi-byte text with an encoding name.
    #[serde(rename = "mbstring")]
    MbString = 12,
}

impl FieldType {
    /// All supported tags, in tag order.
    pub const ALL: [FieldType; 12] = [
        Self::Short,
        Self::Long,
        Self::Char,
        Self::Float,
        Self::Double,
        Self::String,
        Self::Carray,
        Self::Int,
        Self::Ptr,
        Self::Fml,
        Self::View,
        Self::MbString,
    ];

    /// Get the numeric tag.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Look up a type by its numeric tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// The keyword used in field tables and diagnostics.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
            Self::Char => "char",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Carray => "carray",
            Self::Int => "int",
            Self::Ptr => "ptr",
            Self::Fml => "fml32",
            Self::View => "view32",
            Self::MbString => "mbstring",
        }
    }

    /// Parse a field-table type keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let keyword = keyword.to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.keyword() == keyword)
    }

    /// Whether values of this type freely coerce between each other.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Short | Self::Long | Self::Char | Self::Float | Self::Double | Self::Int
        )
    }

    /// Whether values of this type are text or bytes.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::String | Self::Carray | Self::MbString)
    }

    /// Encoded size for fixed-width kinds.
    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Short => Some(2),
            Self::Long => Some(8),
            Self::Char => Some(1),
            Self::Float => Some(4),
            Self::Double => Some(8),
            Self::Int => Some(4),
            Self::Ptr => Some(9),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A field identifier: a value-type tag and an ordinal number packed into
/// one integer whose layout depends on the width family `W`.
pub struct FieldId<W: Width> {
    raw: u32,
    _width: PhantomData<W>,
}

impl<W: Width> FieldId<W> {
    /// Build an identifier from a type and a field number.
    pub fn new(field_type: FieldType, number: u32) -> Result<Self> {
        if number == 0 || number > W::MAX_NUMBER {
            return Err(FmlError::InvalidIdentifier {
                field_type: field_type.keyword().to_string(),
                number: number as u64,
                cause: format!("number must be in 1..={} for {}", W::MAX_NUMBER, W::NAME),
            });
        }
        if !W::supports(field_type) {
            return Err(FmlError::InvalidIdentifier {
                field_type: field_type.keyword().to_string(),
                number: number as u64,
                cause: format!("type not supported by {}", W::NAME),
            });
        }
        Ok(Self {
            raw: ((field_type.tag() as u32) << W::TYPE_SHIFT) | number,
            _width: PhantomData,
        })
    }

    /// Decode and validate a raw identifier.
    pub fn from_raw(raw: u32) -> Result<Self> {
        let tag = raw >> W::TYPE_SHIFT;
        let number = raw & W::MAX_NUMBER;
        let field_type = u8::try_from(tag)
            .ok()
            .and_then(FieldType::from_tag)
            .ok_or(FmlError::UnknownIdentifier { id: raw })?;
        Self::new(field_type, number).map_err(|_| FmlError::UnknownIdentifier { id: raw })
    }

    /// The packed integer.
    #[must_use]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// The ordinal field number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.raw & W::MAX_NUMBER
    }

    /// The declared value type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        // Construction validates the tag, so the lookup cannot miss.
        FieldType::from_tag((self.raw >> W::TYPE_SHIFT) as u8).unwrap_or(FieldType::Carray)
    }

    /// Resolve the name through the process-wide catalog.
    pub fn name(&self) -> Result<String> {
        W::catalog().name_for(*self)
    }
}

impl<W: Width> Clone for FieldId<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: Width> Copy for FieldId<W> {}

impl<W: Width> PartialEq for FieldId<W> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<W: Width> Eq for FieldId<W> {}

impl<W: Width> PartialOrd for FieldId<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<W: Width> Ord for FieldId<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<W: Width> Hash for FieldId<W> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<W: Width> fmt::Debug for FieldId<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldId<{}>({}:{})",
            W::NAME,
            self.field_type(),
            self.number()
        )
    }
}

/// Shows the catalog name when one is already cached, otherwise
/// `(type:number)`. Never triggers a table load.
impl<W: Width> fmt::Display for FieldId<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match W::catalog().cached_name(*self) {
            Some(name) => f.write_str(&name),
            None => write!(f, "({}:{})", self.field_type(), self.number()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Narrow, Wide};

    #[test]
    fn wide_layout_packs_type_in_high_bits() {
        let id = FieldId::<Wide>::new(FieldType::String, 10).unwrap();
        assert_eq!(id.raw(), (5 << 25) | 10);
        assert_eq!(id.number(), 10);
        assert_eq!(id.field_type(), FieldType::String);
    }

    #[test]
    fn narrow_layout_packs_type_above_bit_13() {
        let id = FieldId::<Narrow>::new(FieldType::Long, 110).unwrap();
        assert_eq!(id.raw(), (1 << 13) | 110);
        let back = FieldId::<Narrow>::from_raw(id.raw()).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn number_zero_is_rejected() {
        let err = FieldId::<Wide>::new(FieldType::Short, 0).unwrap_err();
        assert_eq!(err.code(), "E022");
    }

    #[test]
    fn narrow_rejects_wide_only_types() {
        assert!(FieldId::<Narrow>::new(FieldType::Fml, 1).is_err());
        assert!(FieldId::<Narrow>::new(FieldType::Carray, 8191).is_ok());
        assert!(FieldId::<Narrow>::new(FieldType::Carray, 8192).is_err());
    }

    #[test]
    fn unknown_tag_is_unknown_identifier() {
        let raw = 8 << 25 | 1;
        assert!(matches!(
            FieldId::<Wide>::from_raw(raw),
            Err(FmlError::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn keywords_round_trip() {
        for ty in FieldType::ALL {
            assert_eq!(FieldType::from_keyword(ty.keyword()), Some(ty));
        }
        assert_eq!(FieldType::from_keyword("LONG"), Some(FieldType::Long));
        assert_eq!(FieldType::from_keyword("decimal"), None);
    }

    #[test]
    fn ordering_follows_raw_value() {
        let a = FieldId::<Wide>::new(FieldType::Short, 500).unwrap();
        let b = FieldId::<Wide>::new(FieldType::Long, 1).unwrap();
        assert!(a < b);
    }
}
