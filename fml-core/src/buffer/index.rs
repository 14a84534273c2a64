//! Sparse entry index.
//!
//! An indexed buffer keeps its entries stably sorted by identifier, so the
//! occurrences of one field are contiguous and in occurrence order. The
//! index samples every `interval`-th entry; a lookup jumps to the last
//! sample below the wanted identifier and scans forward from there.

use super::entry::Entries;
use crate::arena::HEADER_SIZE;
use crate::types::{FieldId, Width};

/// Entries between index samples unless the caller picks another interval.
pub const DEFAULT_INDEX_INTERVAL: usize = 16;

#[derive(Debug)]
pub(crate) struct Index<W: Width> {
    interval: usize,
    samples: Vec<(FieldId<W>, usize)>,
}

impl<W: Width> Clone for Index<W> {
    fn clone(&self) -> Self {
        Self {
            interval: self.interval,
            samples: self.samples.clone(),
        }
    }
}

impl<W: Width> Index<W> {
    /// Sample a region whose entries are already sorted.
    pub fn build(region: &[u8], interval: usize) -> Self {
        let interval = interval.max(1);
        let samples = Entries::<W>::new(region, HEADER_SIZE)
            .step_by(interval)
            .map(|e| (e.id, e.offset))
            .collect();
        Self { interval, samples }
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn samples(&self) -> usize {
        self.samples.len()
    }

    /// Offset from which a forward scan reaches the first entry with `id`.
    pub fn seek(&self, id: FieldId<W>) -> usize {
        let below = self.samples.partition_point(|(sample, _)| *sample < id);
        match below {
            0 => HEADER_SIZE,
            n => self.samples[n - 1].1,
        }
    }
}

/// Stably sort the entries of `region` by identifier, in place.
///
/// Returns `false` when the entries were already in order.
pub(crate) fn sort_region<W: Width>(region: &mut [u8]) -> bool {
    let mut entries: Vec<_> = Entries::<W>::new(region, HEADER_SIZE).collect();
    if entries.windows(2).all(|w| w[0].id <= w[1].id) {
        return false;
    }
    entries.sort_by_key(|e| e.id);

    let mut body = Vec::with_capacity(region.len() - HEADER_SIZE);
    for e in &entries {
        body.extend_from_slice(&region[e.range()]);
    }
    region[HEADER_SIZE..HEADER_SIZE + body.len()].copy_from_slice(&body);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::entry::encode_entry;
    use crate::types::{FieldType, Wide};
    use crate::value::Value;

    fn id(n: u32) -> FieldId<Wide> {
        FieldId::new(FieldType::Long, n).unwrap()
    }

    fn region(ids: &[u32]) -> Vec<u8> {
        let mut region = vec![0u8; HEADER_SIZE];
        for (i, n) in ids.iter().enumerate() {
            region.extend(encode_entry(id(*n), &Value::Long(i as i64)).unwrap());
        }
        region
    }

    #[test]
    fn seek_lands_at_or_before_first_occurrence() {
        let region = region(&[1, 1, 2, 3, 3, 3, 5, 8]);
        let index = Index::<Wide>::build(&region, 2);
        assert_eq!(index.samples(), 4);

        for target in [1, 2, 3, 5, 8] {
            let start = index.seek(id(target));
            let first = Entries::<Wide>::new(&region, HEADER_SIZE)
                .find(|e| e.id == id(target))
                .unwrap();
            let reached = Entries::<Wide>::new(&region, start)
                .find(|e| e.id >= id(target))
                .unwrap();
            assert_eq!(reached.offset, first.offset);
        }
    }

    #[test]
    fn sort_is_stable() {
        let mut region = region(&[3, 1, 3, 2, 1]);
        assert!(sort_region::<Wide>(&mut region));

        let order: Vec<_> = Entries::<Wide>::new(&region, HEADER_SIZE)
            .map(|e| {
                let value = crate::buffer::entry::decode_value(
                    FieldType::Long,
                    &region[e.value_range()],
                    0,
                )
                .unwrap();
                (e.id.number(), value)
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (1, Value::Long(1)),
                (1, Value::Long(4)),
                (2, Value::Long(3)),
                (3, Value::Long(0)),
                (3, Value::Long(2)),
            ]
        );
        assert!(!sort_region::<Wide>(&mut region));
    }

    #[test]
    fn zero_interval_samples_every_entry() {
        let region = region(&[1, 2, 3]);
        let index = Index::<Wide>::build(&region, 0);
        assert_eq!(index.interval(), 1);
        assert_eq!(index.samples(), 3);
    }
}
