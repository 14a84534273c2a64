//! Property tests for occurrence order, the multiset algebra and the growth
//! policy.

use fml_core::arena::HEADER_SIZE;
use fml_core::prelude::*;
use proptest::prelude::*;

fn id(n: u32) -> FieldId<Wide> {
    FieldId::new(FieldType::Long, n).unwrap()
}

/// Buffers over a handful of field numbers so operands overlap often.
fn entries() -> impl Strategy<Value = Vec<(u32, i64)>> {
    proptest::collection::vec((1u32..6, any::<i64>()), 0..24)
}

fn build(entries: &[(u32, i64)], capacity: usize) -> Fml32 {
    let mut buf = Fml32::with_capacity(capacity).unwrap();
    for (n, v) in entries {
        buf.add(id(*n), *v).unwrap();
    }
    buf
}

fn values(buf: &Fml32, n: u32) -> Vec<i64> {
    (0..buf.count(id(n)))
        .map(|k| buf.get::<i64>(id(n), k).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concat_is_occurrence_wise_append(a in entries(), b in entries()) {
        let mut left = build(&a, 64);
        let right = build(&b, 64);
        left.concat(&right).unwrap();

        for n in 1..6 {
            let mut expected = values(&build(&a, 64), n);
            expected.extend(values(&right, n));
            prop_assert_eq!(values(&left, n), expected);
        }
        prop_assert!(left.is_indexed());
    }

    #[test]
    fn empty_operands_are_identities(a in entries()) {
        let original = build(&a, 64);
        let empty = Fml32::with_capacity(0).unwrap();

        let mut buf = original.clone();
        buf.concat(&empty).unwrap();
        prop_assert_eq!(&buf, &original);

        let mut buf = original.clone();
        buf.update(&empty).unwrap();
        prop_assert_eq!(&buf, &original);

        let mut buf = original.clone();
        buf.outer_join(&empty).unwrap();
        prop_assert_eq!(&buf, &original);

        let mut buf = original.clone();
        buf.join(&empty).unwrap();
        prop_assert!(buf.is_empty());
    }

    #[test]
    fn self_merges_are_idempotent(a in entries()) {
        let original = build(&a, 64);
        let ops: [fn(&mut Fml32, &Fml32) -> Result<()>; 3] =
            [Fml32::join, Fml32::outer_join, Fml32::update];
        for op in ops {
            let mut buf = original.clone();
            op(&mut buf, &original).unwrap();
            prop_assert_eq!(&buf, &original);
        }
    }

    #[test]
    fn join_keeps_exactly_shared_fields(a in entries(), b in entries()) {
        let right = build(&b, 64);
        let mut left = build(&a, 64);
        let before = left.clone();
        left.join(&right).unwrap();

        for n in 1..6 {
            let shared = before.count(id(n)) > 0 && right.count(id(n)) > 0;
            if shared {
                prop_assert_eq!(values(&left, n), values(&right, n));
            } else {
                prop_assert_eq!(left.count(id(n)), 0);
            }
        }
    }

    #[test]
    fn update_overwrites_positionally(a in entries(), b in entries()) {
        let right = build(&b, 64);
        let mut left = build(&a, 64);
        let before = left.clone();
        left.update(&right).unwrap();

        for n in 1..6 {
            let ours = values(&before, n);
            let theirs = values(&right, n);
            let expected: Vec<i64> = (0..ours.len().max(theirs.len()))
                .map(|k| theirs.get(k).or(ours.get(k)).copied().unwrap())
                .collect();
            prop_assert_eq!(values(&left, n), expected);
        }
    }

    #[test]
    fn project_onto_present_fields_is_identity(a in entries()) {
        let original = build(&a, 64);
        let mut buf = original.clone();
        let removed = buf.project(&original.fields()).unwrap();
        prop_assert_eq!(removed, 0);
        prop_assert_eq!(&buf, &original);
    }

    #[test]
    fn occurrences_stay_contiguous(a in entries()) {
        let buf = build(&a, 64);
        let mut finished = Vec::new();
        let mut current = None;
        for (field, occurrence, _) in buf.iter() {
            if current != Some(field) {
                prop_assert!(!finished.contains(&field));
                if let Some(previous) = current {
                    finished.push(previous);
                }
                current = Some(field);
                prop_assert_eq!(occurrence, 0);
            }
        }

        for n in 1..6 {
            let expected: Vec<i64> = a.iter().filter(|(m, _)| *m == n).map(|(_, v)| *v).collect();
            prop_assert_eq!(values(&buf, n), expected);
        }
    }

    #[test]
    fn complementary_projections_leave_nothing(
        a in entries(),
        keep in proptest::collection::vec(1u32..6, 0..5),
    ) {
        let kept: Vec<_> = keep.iter().map(|n| id(*n)).collect();
        let others: Vec<_> = (1..6).filter(|n| !keep.contains(n)).map(id).collect();

        let mut buf = build(&a, 64);
        buf.project(&kept).unwrap();
        for field in buf.fields() {
            prop_assert!(kept.contains(&field));
        }
        buf.project(&others).unwrap();
        prop_assert!(buf.is_empty());
    }

    #[test]
    fn outer_join_extends_join(a in entries(), b in entries()) {
        let left = build(&a, 64);
        let right = build(&b, 64);
        let mut inner = left.clone();
        inner.join(&right).unwrap();
        let mut outer = left.clone();
        outer.outer_join(&right).unwrap();

        prop_assert!(outer.len() >= inner.len());
        for n in 1..6 {
            if inner.count(id(n)) > 0 {
                prop_assert_eq!(values(&outer, n), values(&inner, n));
            }
            if right.count(id(n)) == 0 {
                prop_assert_eq!(values(&outer, n), values(&left, n));
            }
        }
    }

    #[test]
    fn growth_is_transparent(a in entries()) {
        let tight = build(&a, HEADER_SIZE);
        let roomy = build(&a, 4096);
        prop_assert_eq!(&tight, &roomy);
        prop_assert_eq!(tight.checksum().unwrap(), roomy.checksum().unwrap());
        prop_assert!(tight.used() <= tight.capacity());
    }
}
