//! Common test utilities for integration tests.

#![allow(dead_code)]

use fml_core::prelude::*;
use fml_core::testing;

/// Resolve a shared fixture field of the wide family.
pub fn wide(name: &str) -> FieldId<Wide> {
    testing::fixture::<Wide>(name)
}

/// Resolve a shared fixture field of the narrow family.
pub fn narrow(name: &str) -> FieldId<Narrow> {
    testing::fixture::<Narrow>(name)
}

/// A wide buffer holding one occurrence of every value kind.
pub fn every_kind() -> Fml32 {
    let mut inner = Fml32::with_capacity(64).unwrap();
    inner.add(wide("COUNT"), 7i64).unwrap();
    inner.add(wide("NAME"), "inner").unwrap();

    let mut buf = Fml32::new();
    buf.add(wide("NAME"), "hello").unwrap();
    buf.add(wide("COUNT"), -42i64).unwrap();
    buf.add(wide("PRICE"), 19.99f64).unwrap();
    buf.add(wide("RAW"), vec![0u8, 1, 2, 0xff]).unwrap();
    buf.add(wide("FLAG"), b'Y').unwrap();
    buf.add(wide("SHORTV"), -3i16).unwrap();
    buf.add(wide("INTV"), 123_456i32).unwrap();
    buf.add(wide("FLOATV"), 0.5f32).unwrap();
    buf.add(wide("TEXT"), MbString::new("UTF-8", "grüße")).unwrap();
    buf.add(wide("PTR"), PtrValue::owned(0xdead_beef)).unwrap();
    buf.add(wide("REC"), ViewRecord::new("point", vec![1, 0, 2, 0])).unwrap();
    buf.add(wide("SUB"), inner).unwrap();
    buf
}

/// A wide buffer with one `COUNT` occurrence per entry of `values`.
pub fn counts(values: &[i64]) -> Fml32 {
    let mut buf = Fml32::with_capacity(64).unwrap();
    for v in values {
        buf.add(wide("COUNT"), *v).unwrap();
    }
    buf
}
