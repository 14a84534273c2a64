//! Entry encoding, decoding and scanning.
//!
//! An entry is `[id word][len word][value bytes]`, words being two or four
//! bytes wide depending on the width family.

use super::FieldBuffer;
use crate::arena::HEADER_SIZE;
use crate::error::{FmlError, Result};
use crate::types::{FieldId, FieldType, Wide, Width};
use crate::value::{MbString, PtrOwnership, PtrValue, Value, ViewRecord};
use byteorder::{ByteOrder, LittleEndian};
use std::marker::PhantomData;
use std::ops::Range;

/// Position of one entry inside a buffer region.
#[derive(Debug)]
pub(crate) struct RawEntry<W: Width> {
    pub id: FieldId<W>,
    /// Offset of the id word.
    pub offset: usize,
    /// Value length in bytes.
    pub len: usize,
}

impl<W: Width> Clone for RawEntry<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W: Width> Copy for RawEntry<W> {}

impl<W: Width> RawEntry<W> {
    pub fn value_range(&self) -> Range<usize> {
        let start = self.offset + overhead::<W>();
        start..start + self.len
    }

    pub fn end(&self) -> usize {
        self.offset + overhead::<W>() + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// Bytes an entry spends on its id and length words.
pub(crate) fn overhead<W: Width>() -> usize {
    2 * W::WORD_BYTES
}

/// Walks the entries of a region (`bytes[..used]`) starting at `pos`.
///
/// Regions are validated on import and every write goes through the
/// encoder, so a malformed entry simply ends the walk.
pub(crate) struct Entries<'a, W: Width> {
    region: &'a [u8],
    pos: usize,
    _width: PhantomData<W>,
}

impl<'a, W: Width> Entries<'a, W> {
    pub fn new(region: &'a [u8], pos: usize) -> Self {
        Self {
            region,
            pos,
            _width: PhantomData,
        }
    }
}

impl<W: Width> Iterator for Entries<'_, W> {
    type Item = RawEntry<W>;

    fn next(&mut self) -> Option<Self::Item> {
        let word = W::WORD_BYTES;
        if self.pos + 2 * word > self.region.len() {
            return None;
        }
        let id = FieldId::from_raw(W::read_word(&self.region[self.pos..])).ok()?;
        let len = W::read_word(&self.region[self.pos + word..]) as usize;
        let entry = RawEntry {
            id,
            offset: self.pos,
            len,
        };
        if entry.end() > self.region.len() {
            return None;
        }
        self.pos = entry.end();
        Some(entry)
    }
}

/// Check every entry of a region and return how many there are.
pub(crate) fn validate_region<W: Width>(region: &[u8]) -> Result<usize> {
    let word = W::WORD_BYTES;
    let mut pos = HEADER_SIZE;
    let mut count = 0;

    while pos < region.len() {
        if pos + 2 * word > region.len() {
            return Err(FmlError::corrupt(pos, "truncated entry header"));
        }
        let raw = W::read_word(&region[pos..]);
        let id = FieldId::<W>::from_raw(raw)
            .map_err(|_| FmlError::corrupt(pos, format!("invalid field identifier {}", raw)))?;
        let len = W::read_word(&region[pos + word..]) as usize;
        let start = pos + 2 * word;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= region.len())
            .ok_or_else(|| FmlError::corrupt(pos, format!("value of {} bytes overruns region", len)))?;
        decode_value(id.field_type(), &region[start..end], start)?;
        pos = end;
        count += 1;
    }
    Ok(count)
}

/// Levels of nested buffers a single buffer may contain.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Longest encoding or record name a packed value can carry.
const MAX_NAME_LEN: usize = u8::MAX as usize;

fn push_nested<'a, V: Width>(region: &'a [u8], depth: usize, pending: &mut Vec<(&'a [u8], usize)>) {
    for e in Entries::<V>::new(region, HEADER_SIZE) {
        if e.id.field_type() == FieldType::Fml && e.len > 0 {
            pending.push((&region[e.value_range()], depth));
        }
    }
}

/// Deepest chain of non-null nested buffers below `region`.
///
/// Walks with an explicit stack and stops one level past
/// [`MAX_NESTING_DEPTH`]. Malformed entries end a walk early.
pub(crate) fn nesting_depth<W: Width>(region: &[u8]) -> usize {
    let mut pending = Vec::new();
    push_nested::<W>(region, 1, &mut pending);
    let mut deepest = 0;
    while let Some((nested, depth)) = pending.pop() {
        deepest = deepest.max(depth);
        if depth <= MAX_NESTING_DEPTH {
            push_nested::<Wide>(nested, depth + 1, &mut pending);
        }
    }
    deepest
}

/// Reject values the packed encoding cannot represent.
fn check_encodable<W: Width>(id: FieldId<W>, value: &Value) -> Result<()> {
    let name_too_long = |what: &str, name: &str| {
        FmlError::type_mismatch(
            id,
            format!("{} name of at most {} bytes", what, MAX_NAME_LEN),
            format!("{} bytes", name.len()),
        )
    };
    match value {
        Value::MbString(m) if m.encoding.len() > MAX_NAME_LEN => {
            Err(name_too_long("encoding", &m.encoding))
        }
        Value::View(v) if v.name.len() > MAX_NAME_LEN => Err(name_too_long("record", &v.name)),
        Value::Fml(nested) if !nested.is_null() => {
            let depth = nesting_depth::<Wide>(nested.region()) + 1;
            if depth > MAX_NESTING_DEPTH {
                return Err(FmlError::type_mismatch(
                    id,
                    format!("at most {} nested levels", MAX_NESTING_DEPTH),
                    format!("{} levels", depth),
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Encode `value` as a complete entry for `id`.
///
/// The value must already have the field's declared kind.
pub(crate) fn encode_entry<W: Width>(id: FieldId<W>, value: &Value) -> Result<Vec<u8>> {
    check_encodable(id, value)?;
    let word = W::WORD_BYTES;
    let mut out = vec![0u8; 2 * word];
    encode_value(value, &mut out);

    let len = out.len() - 2 * word;
    if len > W::max_value_len() {
        return Err(FmlError::type_mismatch(
            id,
            format!("value of at most {} bytes", W::max_value_len()),
            format!("{} bytes", len),
        ));
    }
    W::write_word(&mut out[..word], id.raw());
    W::write_word(&mut out[word..2 * word], len as u32);
    Ok(out)
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Short(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Long(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Char(v) => out.push(*v),
        Value::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::String(s) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        Value::Carray(b) => out.extend_from_slice(b),
        Value::MbString(m) => {
            push_short_str(out, &m.encoding);
            out.extend_from_slice(&m.bytes);
        }
        Value::Fml(nested) => out.extend_from_slice(&nested.region_bytes()),
        Value::Ptr(p) => {
            out.extend_from_slice(&p.address.to_le_bytes());
            out.push(p.ownership.to_byte());
        }
        Value::View(v) => {
            push_short_str(out, &v.name);
            out.extend_from_slice(&v.data);
        }
    }
}

// Lengths are checked by `check_encodable`.
fn push_short_str(out: &mut Vec<u8>, s: &str) {
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

fn split_short_str(bytes: &[u8], offset: usize) -> Result<(String, &[u8])> {
    let (&len, rest) = bytes
        .split_first()
        .ok_or_else(|| FmlError::corrupt(offset, "missing name length"))?;
    let len = len as usize;
    if rest.len() < len {
        return Err(FmlError::corrupt(offset, "name overruns value"));
    }
    let name = std::str::from_utf8(&rest[..len])
        .map_err(|_| FmlError::corrupt(offset + 1, "name is not valid UTF-8"))?;
    Ok((name.to_string(), &rest[len..]))
}

/// Decode a value of kind `field_type`; `offset` is used for diagnostics.
pub(crate) fn decode_value(field_type: FieldType, bytes: &[u8], offset: usize) -> Result<Value> {
    match field_type.fixed_size() {
        Some(size) if bytes.len() != size => {
            return Err(FmlError::corrupt(
                offset,
                format!("{} value must be {} bytes, found {}", field_type, size, bytes.len()),
            ));
        }
        _ => {}
    }

    Ok(match field_type {
        FieldType::Short => Value::Short(LittleEndian::read_i16(bytes)),
        FieldType::Long => Value::Long(LittleEndian::read_i64(bytes)),
        FieldType::Char => Value::Char(bytes[0]),
        FieldType::Float => Value::Float(LittleEndian::read_f32(bytes)),
        FieldType::Double => Value::Double(LittleEndian::read_f64(bytes)),
        FieldType::Int => Value::Int(LittleEndian::read_i32(bytes)),
        FieldType::String => {
            let text = bytes.strip_suffix(&[0]).unwrap_or(bytes);
            let text = std::str::from_utf8(text)
                .map_err(|_| FmlError::corrupt(offset, "string is not valid UTF-8"))?;
            Value::String(text.to_string())
        }
        FieldType::Carray => Value::Carray(bytes.to_vec()),
        FieldType::MbString => {
            let (encoding, rest) = split_short_str(bytes, offset)?;
            Value::MbString(MbString::new(encoding, rest))
        }
        FieldType::Fml => {
            if bytes.is_empty() {
                Value::Fml(FieldBuffer::new())
            } else {
                Value::Fml(FieldBuffer::<Wide>::from_region(bytes).map_err(|e| match e {
                    FmlError::Corrupt { offset: inner, cause } => FmlError::Corrupt {
                        offset: offset + inner,
                        cause: format!("nested buffer: {}", cause),
                    },
                    other => other,
                })?)
            }
        }
        FieldType::Ptr => {
            let ownership = PtrOwnership::from_byte(bytes[8])
                .ok_or_else(|| FmlError::corrupt(offset + 8, "invalid pointer ownership"))?;
            Value::Ptr(PtrValue {
                address: LittleEndian::read_u64(bytes),
                ownership,
            })
        }
        FieldType::View => {
            let (name, data) = split_short_str(bytes, offset)?;
            Value::View(ViewRecord::new(name, data))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Narrow;

    fn region_with(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut region = vec![0u8; HEADER_SIZE];
        for e in entries {
            region.extend_from_slice(e);
        }
        region
    }

    #[test]
    fn narrow_entry_layout() {
        let id = FieldId::<Narrow>::new(FieldType::Short, 3).unwrap();
        let bytes = encode_entry(id, &Value::Short(-2)).unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(Narrow::read_word(&bytes), id.raw());
        assert_eq!(Narrow::read_word(&bytes[2..]), 2);
        assert_eq!(&bytes[4..], &(-2i16).to_le_bytes());
    }

    #[test]
    fn strings_carry_a_terminator() {
        let id = FieldId::<Wide>::new(FieldType::String, 1).unwrap();
        let bytes = encode_entry(id, &Value::from("hi")).unwrap();
        assert_eq!(&bytes[8..], b"hi\0");
        assert_eq!(
            decode_value(FieldType::String, &bytes[8..], 8).unwrap(),
            Value::from("hi")
        );
    }

    #[test]
    fn scanning_walks_every_entry() {
        let a = FieldId::<Wide>::new(FieldType::Long, 1).unwrap();
        let b = FieldId::<Wide>::new(FieldType::Carray, 2).unwrap();
        let region = region_with(&[
            encode_entry(a, &Value::Long(1)).unwrap(),
            encode_entry(b, &Value::Carray(vec![1, 2, 3])).unwrap(),
        ]);

        let entries: Vec<_> = Entries::<Wide>::new(&region, HEADER_SIZE).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].id, b);
        assert_eq!(&region[entries[1].value_range()], &[1, 2, 3]);
        assert_eq!(entries[1].end(), region.len());
        assert_eq!(validate_region::<Wide>(&region).unwrap(), 2);
    }

    #[test]
    fn truncated_value_is_corrupt() {
        let id = FieldId::<Wide>::new(FieldType::Double, 4).unwrap();
        let mut region = region_with(&[encode_entry(id, &Value::Double(1.5)).unwrap()]);
        region.pop();
        let err = validate_region::<Wide>(&region).unwrap_err();
        assert!(matches!(err, FmlError::Corrupt { offset, .. } if offset == HEADER_SIZE));
    }

    #[test]
    fn wrong_fixed_size_is_corrupt() {
        assert!(decode_value(FieldType::Long, &[0u8; 4], 0).is_err());
        assert!(decode_value(FieldType::Ptr, &[0u8; 8], 0).is_err());
    }

    #[test]
    fn packed_kinds_decode() {
        let mut out = Vec::new();
        encode_value(&Value::MbString(MbString::new("SJIS", vec![0x82, 0xa0])), &mut out);
        assert_eq!(out[0], 4);
        assert_eq!(
            decode_value(FieldType::MbString, &out, 0).unwrap(),
            Value::MbString(MbString::new("SJIS", vec![0x82, 0xa0]))
        );

        let mut out = Vec::new();
        encode_value(&Value::Ptr(PtrValue::owned(0xdead)), &mut out);
        assert_eq!(
            decode_value(FieldType::Ptr, &out, 0).unwrap(),
            Value::Ptr(PtrValue::owned(0xdead))
        );
    }

    #[test]
    fn overlong_names_are_rejected() {
        let text = FieldId::<Wide>::new(FieldType::MbString, 1).unwrap();
        let view = FieldId::<Wide>::new(FieldType::View, 2).unwrap();
        let long = "x".repeat(MAX_NAME_LEN + 1);

        let err = encode_entry(text, &Value::MbString(MbString::new(long.clone(), vec![1u8])))
            .unwrap_err();
        assert!(matches!(err, FmlError::TypeMismatch { .. }));
        let err = encode_entry(view, &Value::View(ViewRecord::new(long, vec![1u8]))).unwrap_err();
        assert!(matches!(err, FmlError::TypeMismatch { .. }));

        let edge = MbString::new("y".repeat(MAX_NAME_LEN), vec![7u8]);
        let bytes = encode_entry(text, &Value::MbString(edge.clone())).unwrap();
        assert_eq!(
            decode_value(FieldType::MbString, &bytes[8..], 8).unwrap(),
            Value::MbString(edge)
        );
    }

    #[test]
    fn nesting_depth_counts_non_null_levels() {
        let sub = FieldId::<Wide>::new(FieldType::Fml, 1).unwrap();
        let mut inner = FieldBuffer::<Wide>::with_capacity(64).unwrap();
        inner.add(sub, FieldBuffer::<Wide>::new()).unwrap();
        assert_eq!(nesting_depth::<Wide>(inner.region()), 0);

        let mut outer = FieldBuffer::<Wide>::with_capacity(64).unwrap();
        outer.add(sub, inner).unwrap();
        assert_eq!(nesting_depth::<Wide>(outer.region()), 1);
    }

    #[test]
    fn null_nested_buffer_encodes_empty() {
        let mut out = Vec::new();
        encode_value(&Value::Fml(FieldBuffer::new()), &mut out);
        assert!(out.is_empty());
        let back = decode_value(FieldType::Fml, &out, 0).unwrap();
        assert!(matches!(back, Value::Fml(ref b) if b.is_null()));
    }
}
