//! Whole-buffer algebra.
//!
//! Each operator groups both operands' entries by identifier (occurrence
//! order preserved), decides per identifier which occurrences survive, and
//! installs the result as a freshly indexed region. "Replace" always means
//! by matching occurrence number, never by value.
//!
//! | operator     | identifier only in `self` | in both                       | only in `other` |
//! |--------------|---------------------------|-------------------------------|-----------------|
//! | `concat`     | kept                      | `self`'s then `other`'s       | added           |
//! | `join`       | dropped                   | `other`'s                     | dropped         |
//! | `outer_join` | kept                      | `other`'s                     | dropped         |
//! | `update`     | kept                      | positional overwrite + extras | added           |

use super::FieldBuffer;
use crate::error::Result;
use crate::types::{FieldId, Width};
use std::collections::BTreeMap;

/// Raw entry bytes per identifier, in occurrence order.
type Groups<'a, W> = BTreeMap<FieldId<W>, Vec<&'a [u8]>>;

impl<W: Width> FieldBuffer<W> {
    fn groups(&self) -> Groups<'_, W> {
        let region = self.region();
        let mut groups: Groups<'_, W> = BTreeMap::new();
        for e in self.entries() {
            groups.entry(e.id).or_default().push(&region[e.range()]);
        }
        groups
    }

    fn merge_with(
        &mut self,
        other: &Self,
        operation: &'static str,
        merge: impl Fn(Option<&Vec<&[u8]>>, Option<&Vec<&[u8]>>, &mut Vec<u8>),
    ) -> Result<()> {
        self.check_allocated(operation)?;
        other.check_allocated(operation)?;

        let body = {
            let ours = self.groups();
            let theirs = other.groups();
            let mut ids: Vec<_> = ours.keys().chain(theirs.keys()).copied().collect();
            ids.sort();
            ids.dedup();

            let mut body = Vec::with_capacity(self.used() + other.used());
            for id in ids {
                merge(ours.get(&id), theirs.get(&id), &mut body);
            }
            body
        };

        self.install(&body)?;
        tracing::debug!(operation, entries = self.len(), "Merged field buffers");
        Ok(())
    }

    /// Multiset union: `other`'s occurrences follow `self`'s for every
    /// identifier.
    pub fn concat(&mut self, other: &Self) -> Result<()> {
        self.merge_with(other, "concat", |ours, theirs, body| {
            for entry in ours.into_iter().chain(theirs).flatten() {
                body.extend_from_slice(entry);
            }
        })
    }

    /// Keep only identifiers present in both buffers, with `other`'s
    /// occurrences.
    pub fn join(&mut self, other: &Self) -> Result<()> {
        self.merge_with(other, "join", |ours, theirs, body| {
            if let (Some(_), Some(theirs)) = (ours, theirs) {
                for entry in theirs {
                    body.extend_from_slice(entry);
                }
            }
        })
    }

    /// Like [`join`](Self::join), but identifiers of `self` that `other`
    /// lacks are kept unchanged.
    pub fn outer_join(&mut self, other: &Self) -> Result<()> {
        self.merge_with(other, "outer_join", |ours, theirs, body| {
            let chosen = match (ours, theirs) {
                (Some(_), Some(theirs)) => theirs,
                (Some(ours), None) => ours,
                (None, _) => return,
            };
            for entry in chosen {
                body.extend_from_slice(entry);
            }
        })
    }

    /// Overwrite `self`'s occurrences with `other`'s position by position,
    /// appending any extra occurrences and any identifiers `self` lacks.
    pub fn update(&mut self, other: &Self) -> Result<()> {
        self.merge_with(other, "update", |ours, theirs, body| {
            let ours = ours.map_or(&[][..], Vec::as_slice);
            let theirs = theirs.map_or(&[][..], Vec::as_slice);
            for k in 0..ours.len().max(theirs.len()) {
                let entry = theirs.get(k).or_else(|| ours.get(k));
                if let Some(entry) = entry {
                    body.extend_from_slice(entry);
                }
            }
        })
    }
}
