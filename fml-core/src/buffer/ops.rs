//! Per-field operations: typed CRUD by `(identifier, occurrence)`.

use super::FieldBuffer;
use super::entry::{Entries, RawEntry, decode_value, encode_entry};
use crate::arena::{BufferHeader, HEADER_SIZE};
use crate::error::{FmlError, Result};
use crate::types::{FieldId, Width};
use crate::value::{FromValue, Value};
use regex::Regex;
use std::collections::{HashMap, HashSet};

fn not_present<W: Width>(id: FieldId<W>, occurrence: usize) -> FmlError {
    FmlError::NotPresent {
        field: id.to_string(),
        occurrence,
    }
}

/// Compile a pattern that must match a whole value.
pub(crate) fn whole_match_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| FmlError::MalformedExpression {
        expr: pattern.to_string(),
        position: 0,
        cause: e.to_string(),
    })
}

impl<W: Width> FieldBuffer<W> {
    // =========================================================================
    // Locating entries
    // =========================================================================

    fn scan_field(&self, id: FieldId<W>) -> Box<dyn Iterator<Item = RawEntry<W>> + '_> {
        match &self.index {
            Some(index) => Box::new(
                Entries::new(self.region(), index.seek(id))
                    .skip_while(move |e| e.id < id)
                    .take_while(move |e| e.id == id),
            ),
            None => Box::new(self.entries().filter(move |e| e.id == id)),
        }
    }

    /// Occurrences of `id` in occurrence order, in any index state.
    pub(crate) fn occurrences(&self, id: FieldId<W>) -> Vec<RawEntry<W>> {
        self.scan_field(id).collect()
    }

    pub(crate) fn occurrence(&self, id: FieldId<W>, occurrence: usize) -> Option<RawEntry<W>> {
        self.scan_field(id).nth(occurrence)
    }

    /// Where a new highest occurrence of `id` goes.
    fn insert_point(&self, id: FieldId<W>) -> usize {
        match &self.index {
            Some(index) => Entries::<W>::new(self.region(), index.seek(id))
                .find(|e| e.id > id)
                .map_or(self.used(), |e| e.offset),
            None => self.used(),
        }
    }

    fn decode(&self, entry: &RawEntry<W>) -> Result<Value> {
        let range = entry.value_range();
        let offset = range.start;
        decode_value(entry.id.field_type(), &self.region()[range], offset)
    }

    /// Value of an occurrence whatever the index state; `None` when absent.
    pub(crate) fn value_at(&self, id: FieldId<W>, occurrence: usize) -> Result<Option<Value>> {
        self.occurrence(id, occurrence)
            .map(|e| self.decode(&e))
            .transpose()
    }

    /// Allocate if null, run `write` under the growth policy, and return
    /// to null if a fresh allocation was not used.
    fn write_allocating(
        &mut self,
        operation: &'static str,
        write: impl FnMut(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let fresh = self.ensure_allocated()?;
        let result = self.with_growth(operation, write);
        if fresh && result.is_err() {
            self.free();
        }
        result
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Add `value` as the new highest occurrence of `id`.
    ///
    /// Numeric values are converted to the field's numeric kind; other
    /// kinds must match exactly. Works on indexed and unindexed buffers.
    pub fn add(&mut self, id: FieldId<W>, value: impl Into<Value>) -> Result<()> {
        let value = value.into().coerce_to(id.field_type(), &id)?;
        let encoded = encode_entry(id, &value)?;
        self.write_allocating("add", |buf| {
            let at = buf.insert_point(id);
            buf.splice(at..at, &encoded)?;
            buf.refresh_index();
            Ok(())
        })
    }

    /// Append `value` at the physical end without conversion.
    ///
    /// The buffer is left unindexed; call [`build_index`](Self::build_index)
    /// before random access.
    pub fn append(&mut self, id: FieldId<W>, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if value.field_type() != id.field_type() {
            return Err(FmlError::type_mismatch(
                id,
                id.field_type(),
                value.field_type(),
            ));
        }
        let encoded = encode_entry(id, &value)?;
        self.write_allocating("append", |buf| {
            let end = buf.used();
            buf.splice(end..end, &encoded)?;
            buf.drop_index();
            Ok(())
        })
    }

    /// Overwrite occurrence `occurrence` of `id`.
    ///
    /// Past the last occurrence, the gap is filled with default values
    /// (zero, empty text, null buffer) before `value` is stored.
    /// Occurrences above zero need an indexed buffer.
    pub fn set(&mut self, id: FieldId<W>, occurrence: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into().coerce_to(id.field_type(), &id)?;
        let encoded = encode_entry(id, &value)?;
        if occurrence > 0 && !self.is_null() && !self.is_indexed() {
            return Err(FmlError::NotIndexed { operation: "set" });
        }

        let filler = if self.count(id) < occurrence {
            encode_entry(id, &Value::default_for(id.field_type()))?
        } else {
            Vec::new()
        };

        self.write_allocating("set", |buf| {
            let existing = buf.occurrences(id);
            match existing.get(occurrence) {
                Some(entry) => buf.splice(entry.range(), &encoded)?,
                None => {
                    let mut run = Vec::with_capacity(
                        filler.len() * (occurrence - existing.len()) + encoded.len(),
                    );
                    for _ in existing.len()..occurrence {
                        run.extend_from_slice(&filler);
                    }
                    run.extend_from_slice(&encoded);
                    let at = buf.insert_point(id);
                    buf.splice(at..at, &run)?;
                }
            }
            buf.refresh_index();
            Ok(())
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read an occurrence converted to `T`.
    pub fn get<T: FromValue>(&self, id: FieldId<W>, occurrence: usize) -> Result<T> {
        let value = self.get_value(id, occurrence)?;
        T::from_value(value, &id)
    }

    /// Read an occurrence as stored.
    pub fn get_value(&self, id: FieldId<W>, occurrence: usize) -> Result<Value> {
        self.require_index("get")?;
        let entry = self
            .occurrence(id, occurrence)
            .ok_or_else(|| not_present(id, occurrence))?;
        self.decode(&entry)
    }

    /// Read the highest occurrence of `id`.
    pub fn get_last(&self, id: FieldId<W>) -> Result<Value> {
        self.require_index("get_last")?;
        match self.count(id) {
            0 => Err(not_present(id, 0)),
            n => self.get_value(id, n - 1),
        }
    }

    /// Stored byte length of an occurrence (string lengths include the
    /// terminator).
    pub fn field_len(&self, id: FieldId<W>, occurrence: usize) -> Result<usize> {
        self.require_index("field_len")?;
        self.occurrence(id, occurrence)
            .map(|e| e.len)
            .ok_or_else(|| not_present(id, occurrence))
    }

    /// Number of occurrences of `id`; zero for a null buffer.
    pub fn count(&self, id: FieldId<W>) -> usize {
        self.scan_field(id).count()
    }

    /// Whether occurrence `occurrence` of `id` exists.
    pub fn has(&self, id: FieldId<W>, occurrence: usize) -> bool {
        self.occurrence(id, occurrence).is_some()
    }

    /// Distinct identifiers, in storage order.
    pub fn fields(&self) -> Vec<FieldId<W>> {
        let mut seen = HashSet::new();
        self.entries()
            .map(|e| e.id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// First occurrence of `id` equal to `value` (after numeric conversion).
    pub fn find(&self, id: FieldId<W>, value: impl Into<Value>) -> Result<Option<usize>> {
        self.require_index("find")?;
        let wanted = value.into().coerce_to(id.field_type(), &id)?;
        for (occurrence, entry) in self.occurrences(id).iter().enumerate() {
            if self.decode(entry)? == wanted {
                return Ok(Some(occurrence));
            }
        }
        Ok(None)
    }

    /// First occurrence of a text field whose whole value matches `pattern`.
    pub fn find_match(&self, id: FieldId<W>, pattern: &str) -> Result<Option<usize>> {
        self.require_index("find_match")?;
        if !id.field_type().is_textual() {
            return Err(FmlError::type_mismatch(
                id,
                "string, carray or mbstring",
                id.field_type(),
            ));
        }
        let regex = whole_match_regex(pattern)?;
        for (occurrence, entry) in self.occurrences(id).iter().enumerate() {
            let matched = self
                .decode(entry)?
                .text_lossy()
                .is_some_and(|text| regex.is_match(&text));
            if matched {
                return Ok(Some(occurrence));
            }
        }
        Ok(None)
    }

    /// Every occurrence in storage order as `(id, occurrence, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (FieldId<W>, usize, Value)> + '_ {
        let mut seen: HashMap<FieldId<W>, usize> = HashMap::new();
        self.entries().map(move |e| {
            let slot = seen.entry(e.id).or_insert(0);
            let occurrence = *slot;
            *slot += 1;
            // Entries are validated on write and import.
            let value = self
                .decode(&e)
                .unwrap_or_else(|_| Value::Carray(self.region()[e.value_range()].to_vec()));
            (e.id, occurrence, value)
        })
    }

    /// The position after `after` in storage order; `None` starts from the
    /// beginning. Returns `None` once the walk is past the last entry.
    pub fn next_field(&self, after: Option<(FieldId<W>, usize)>) -> Option<(FieldId<W>, usize)> {
        let mut seen: HashMap<FieldId<W>, usize> = HashMap::new();
        let mut passed = after.is_none();
        for e in self.entries() {
            let slot = seen.entry(e.id).or_insert(0);
            let position = (e.id, *slot);
            *slot += 1;
            if passed {
                return Some(position);
            }
            passed = after == Some(position);
        }
        None
    }

    /// CRC-32 over every entry's bytes in storage order.
    pub fn checksum(&self) -> Result<u32> {
        self.check_allocated("checksum")?;
        Ok(crc32fast::hash(&self.region()[HEADER_SIZE..]))
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove one occurrence; later occurrences shift down by one.
    pub fn erase(&mut self, id: FieldId<W>, occurrence: usize) -> Result<()> {
        self.require_index("erase")?;
        let entry = self
            .occurrence(id, occurrence)
            .ok_or_else(|| not_present(id, occurrence))?;
        self.splice(entry.range(), &[])?;
        self.refresh_index();
        Ok(())
    }

    /// Remove every occurrence of `id`; returns how many were removed.
    pub fn erase_all(&mut self, id: FieldId<W>) -> Result<usize> {
        self.check_allocated("erase_all")?;
        Ok(self.retain(|e| e != id))
    }

    /// Remove every occurrence of each listed identifier.
    pub fn erase_many(&mut self, ids: &[FieldId<W>]) -> Result<usize> {
        self.check_allocated("erase_many")?;
        Ok(self.retain(|e| !ids.contains(&e)))
    }

    /// Keep only the listed identifiers; returns how many occurrences
    /// were removed.
    pub fn project(&mut self, ids: &[FieldId<W>]) -> Result<usize> {
        self.check_allocated("project")?;
        Ok(self.retain(|e| ids.contains(&e)))
    }

    /// Compact the region down to the entries `keep` accepts, preserving
    /// their order.
    fn retain(&mut self, keep: impl Fn(FieldId<W>) -> bool) -> usize {
        let entries: Vec<_> = self.entries().collect();
        let Some(storage) = self.storage.as_mut() else {
            return 0;
        };

        let bytes = storage.block.bytes_mut();
        let used = BufferHeader::read_used(bytes);
        let mut write = HEADER_SIZE;
        let mut removed = 0;
        for e in entries {
            if keep(e.id) {
                let len = e.range().len();
                bytes.copy_within(e.range(), write);
                write += len;
            } else {
                removed += 1;
            }
        }
        bytes[write..used].fill(0);
        BufferHeader::write_used(bytes, write);
        self.refresh_index();
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{Fml16, Fml32};
    use crate::types::{FieldType, Narrow, Wide};
    use crate::value::{MbString, PtrValue, ViewRecord};

    fn wide(ty: FieldType, n: u32) -> FieldId<Wide> {
        FieldId::new(ty, n).unwrap()
    }

    fn narrow(ty: FieldType, n: u32) -> FieldId<Narrow> {
        FieldId::new(ty, n).unwrap()
    }

    #[test]
    fn add_then_get_round_trips() {
        let mut buf = Fml32::with_capacity(256).unwrap();
        let name = wide(FieldType::String, 1);
        let raw = wide(FieldType::Carray, 2);
        let rate = wide(FieldType::Double, 3);
        let text = wide(FieldType::MbString, 4);
        let ptr = wide(FieldType::Ptr, 5);
        let view = wide(FieldType::View, 6);

        buf.add(name, "alice").unwrap();
        buf.add(raw, vec![0u8, 1, 2]).unwrap();
        buf.add(rate, 2.5f64).unwrap();
        buf.add(text, MbString::new("UTF-8", "héllo")).unwrap();
        buf.add(ptr, PtrValue::owned(0xfeed)).unwrap();
        buf.add(view, ViewRecord::new("order", vec![9; 12])).unwrap();

        assert_eq!(buf.get::<String>(name, 0).unwrap(), "alice");
        assert_eq!(buf.get::<Vec<u8>>(raw, 0).unwrap(), vec![0, 1, 2]);
        assert_eq!(buf.get::<f64>(rate, 0).unwrap(), 2.5);
        assert_eq!(buf.get::<MbString>(text, 0).unwrap().encoding, "UTF-8");
        assert_eq!(buf.get::<PtrValue>(ptr, 0).unwrap(), PtrValue::owned(0xfeed));
        assert_eq!(buf.get::<ViewRecord>(view, 0).unwrap().data.len(), 12);
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn nested_buffers_store_by_value() {
        let mut inner = Fml32::with_capacity(64).unwrap();
        inner.add(wide(FieldType::Long, 1), 7i64).unwrap();

        let mut outer = Fml32::with_capacity(64).unwrap();
        let sub = wide(FieldType::Fml, 10);
        outer.add(sub, inner.clone()).unwrap();
        inner.add(wide(FieldType::Long, 1), 8i64).unwrap();

        let stored: Fml32 = outer.get(sub, 0).unwrap();
        assert_eq!(stored.count(wide(FieldType::Long, 1)), 1);
        assert!(outer.get::<String>(sub, 0).is_err());
    }

    #[test]
    fn add_coerces_numeric_values() {
        let mut buf = Fml16::with_capacity(64).unwrap();
        let count = narrow(FieldType::Int, 1);
        buf.add(count, 41.9f64).unwrap();
        buf.add(count, 7i16).unwrap();

        assert_eq!(buf.get::<i32>(count, 0).unwrap(), 41);
        assert_eq!(buf.get::<String>(count, 1).unwrap(), "7");
        assert_eq!(buf.get_value(count, 1).unwrap(), Value::Int(7));
    }

    #[test]
    fn add_rejects_mismatched_text_kinds() {
        let mut buf = Fml16::with_capacity(64).unwrap();
        let raw = narrow(FieldType::Carray, 1);
        let err = buf.add(raw, "text").unwrap_err();
        assert!(matches!(err, FmlError::TypeMismatch { .. }));
        assert_eq!(buf.count(raw), 0);
    }

    #[test]
    fn overlong_record_names_are_refused() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let view = wide(FieldType::View, 1);
        let err = buf
            .add(view, ViewRecord::new("r".repeat(300), vec![1u8]))
            .unwrap_err();
        assert!(matches!(err, FmlError::TypeMismatch { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn add_on_null_allocates() {
        let mut buf = Fml32::new();
        buf.add(wide(FieldType::Short, 1), 3i16).unwrap();
        assert!(!buf.is_null());
        assert!(buf.is_indexed());

        let mut untouched = Fml32::new();
        assert!(untouched.add(wide(FieldType::Short, 1), "x").is_err());
        assert!(untouched.is_null());
    }

    #[test]
    fn occurrences_follow_insertion_order() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let a = wide(FieldType::Long, 2);
        let b = wide(FieldType::Long, 1);
        for i in 0..5i64 {
            buf.add(a, i).unwrap();
            buf.add(b, i * 10).unwrap();
        }

        assert_eq!(buf.count(a), 5);
        for i in 0..5 {
            assert_eq!(buf.get::<i64>(a, i).unwrap(), i as i64);
            assert_eq!(buf.get::<i64>(b, i).unwrap(), i as i64 * 10);
        }
        assert_eq!(buf.fields(), vec![b, a]);
        assert_eq!(buf.get_last(a).unwrap(), Value::Long(4));
    }

    #[test]
    fn append_leaves_buffer_unindexed() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let a = wide(FieldType::Long, 1);
        buf.append(a, Value::Long(1)).unwrap();
        assert!(!buf.is_indexed());
        assert_eq!(buf.count(a), 1);

        assert!(matches!(
            buf.get::<i64>(a, 0),
            Err(FmlError::NotIndexed { operation: "get" })
        ));
        assert!(matches!(
            buf.append(a, 2i32),
            Err(FmlError::TypeMismatch { .. })
        ));

        buf.build_index(crate::buffer::DEFAULT_INDEX_INTERVAL).unwrap();
        assert_eq!(buf.get::<i64>(a, 0).unwrap(), 1);
    }

    #[test]
    fn add_on_unindexed_appends_in_place() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let a = wide(FieldType::Long, 2);
        let b = wide(FieldType::Long, 1);
        buf.append(a, Value::Long(1)).unwrap();
        buf.add(b, 2i64).unwrap();
        buf.add(a, 3i64).unwrap();
        assert!(!buf.is_indexed());
        assert_eq!(buf.fields(), vec![a, b]);

        buf.build_index(4).unwrap();
        assert_eq!(buf.fields(), vec![b, a]);
        assert_eq!(buf.get::<i64>(a, 1).unwrap(), 3);
    }

    #[test]
    fn set_overwrites_and_sparse_extends() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let name = wide(FieldType::String, 1);
        buf.add(name, "a").unwrap();

        buf.set(name, 0, "replaced value").unwrap();
        assert_eq!(buf.get::<String>(name, 0).unwrap(), "replaced value");

        buf.set(name, 3, "d").unwrap();
        assert_eq!(buf.count(name), 4);
        assert_eq!(buf.get::<String>(name, 1).unwrap(), "");
        assert_eq!(buf.get::<String>(name, 2).unwrap(), "");
        assert_eq!(buf.get::<String>(name, 3).unwrap(), "d");
    }

    #[test]
    fn set_beyond_first_requires_index() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let a = wide(FieldType::Long, 1);
        buf.append(a, Value::Long(1)).unwrap();

        assert!(matches!(
            buf.set(a, 1, 5i64),
            Err(FmlError::NotIndexed { .. })
        ));
        buf.set(a, 0, 9i64).unwrap();
        buf.build_index(2).unwrap();
        assert_eq!(buf.get::<i64>(a, 0).unwrap(), 9);
    }

    #[test]
    fn erase_compacts_occurrences() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let name = wide(FieldType::String, 1);
        buf.set(name, 0, "hello").unwrap();
        buf.set(name, 1, "world").unwrap();

        buf.erase(name, 0).unwrap();
        assert_eq!(buf.get::<String>(name, 0).unwrap(), "world");
        assert!(!buf.has(name, 1));
        assert!(matches!(
            buf.erase(name, 4),
            Err(FmlError::NotPresent { occurrence: 4, .. })
        ));
    }

    #[test]
    fn bulk_removal() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let (a, b, c) = (
            wide(FieldType::Short, 1),
            wide(FieldType::Short, 2),
            wide(FieldType::Short, 3),
        );
        for id in [a, b, c, a, b, c] {
            buf.add(id, 1i16).unwrap();
        }

        assert_eq!(buf.erase_all(a).unwrap(), 2);
        assert_eq!(buf.fields(), vec![b, c]);

        let mut projected = buf.clone();
        assert_eq!(projected.project(&[c]).unwrap(), 2);
        assert_eq!(projected.fields(), vec![c]);

        assert_eq!(buf.erase_many(&[b, c]).unwrap(), 4);
        assert!(buf.is_empty());
        assert!(Fml32::new().erase_all(a).is_err());
    }

    #[test]
    fn find_by_value_and_pattern() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let code = wide(FieldType::Long, 1);
        let name = wide(FieldType::String, 2);
        for v in [10i64, 20, 30] {
            buf.add(code, v).unwrap();
        }
        buf.add(name, "alpha").unwrap();
        buf.add(name, "beta").unwrap();

        assert_eq!(buf.find(code, 20i32).unwrap(), Some(1));
        assert_eq!(buf.find(code, 99i64).unwrap(), None);
        assert_eq!(buf.find_match(name, "b.*").unwrap(), Some(1));
        assert_eq!(buf.find_match(name, "eta").unwrap(), None);
        assert!(buf.find_match(code, ".*").is_err());
        assert!(matches!(
            buf.find_match(name, "("),
            Err(FmlError::MalformedExpression { .. })
        ));
    }

    #[test]
    fn queries_on_null_buffer() {
        let buf = Fml32::new();
        let a = wide(FieldType::Long, 1);
        assert_eq!(buf.count(a), 0);
        assert!(!buf.has(a, 0));
        assert!(buf.fields().is_empty());
        assert!(matches!(
            buf.get::<i64>(a, 0),
            Err(FmlError::BufferNull { .. })
        ));
    }

    #[test]
    fn iteration_and_cursor_walk() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let a = wide(FieldType::Long, 1);
        let b = wide(FieldType::Long, 2);
        buf.add(a, 1i64).unwrap();
        buf.add(a, 2i64).unwrap();
        buf.add(b, 3i64).unwrap();

        let items: Vec<_> = buf.iter().collect();
        assert_eq!(
            items,
            vec![
                (a, 0, Value::Long(1)),
                (a, 1, Value::Long(2)),
                (b, 0, Value::Long(3)),
            ]
        );

        let mut walk = Vec::new();
        let mut cursor = None;
        while let Some(pos) = buf.next_field(cursor) {
            walk.push(pos);
            cursor = Some(pos);
        }
        assert_eq!(walk, vec![(a, 0), (a, 1), (b, 0)]);
    }

    #[test]
    fn field_len_counts_terminator() {
        let mut buf = Fml32::with_capacity(64).unwrap();
        let name = wide(FieldType::String, 1);
        buf.add(name, "abc").unwrap();
        assert_eq!(buf.field_len(name, 0).unwrap(), 4);
    }

    #[test]
    fn checksum_tracks_content() {
        let mut a = Fml32::with_capacity(64).unwrap();
        let mut b = Fml32::with_capacity(128).unwrap();
        let id = wide(FieldType::Long, 1);
        a.add(id, 1i64).unwrap();
        b.add(id, 1i64).unwrap();
        assert_eq!(a.checksum().unwrap(), b.checksum().unwrap());

        b.set(id, 0, 2i64).unwrap();
        assert_ne!(a.checksum().unwrap(), b.checksum().unwrap());
    }

    #[test]
    fn growth_retry_after_shrink() {
        let mut buf = Fml16::with_capacity(256).unwrap();
        buf.realloc(HEADER_SIZE).unwrap();
        assert_eq!(buf.capacity(), HEADER_SIZE);

        let count = narrow(FieldType::Long, 7);
        buf.add(count, 5i64).unwrap();
        assert_eq!(buf.get::<i64>(count, 0).unwrap(), 5);
        assert!(buf.used() <= buf.capacity());
        assert_eq!(buf.capacity(), HEADER_SIZE * 2);
    }

    #[test]
    fn repeated_growth_keeps_every_value() {
        let mut buf = Fml32::with_capacity(HEADER_SIZE).unwrap();
        let id = wide(FieldType::Int, 1);
        for i in 0..200i32 {
            buf.add(id, i).unwrap();
            assert!(buf.used() <= buf.capacity());
        }
        for i in 0..200usize {
            assert_eq!(buf.get::<i32>(id, i).unwrap(), i as i32);
        }
    }
}
