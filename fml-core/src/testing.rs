//! Shared field tables for tests.
//!
//! Both process-wide catalogs are global, so every test that resolves names
//! through them registers the same definitions here instead of its own.

use crate::catalog::FieldTable;
use crate::types::{FieldId, FieldType, Narrow, Wide, Width};
use std::sync::Once;

/// Fields every width family can declare.
pub fn narrow_fixture_table() -> FieldTable {
    FieldTable::new()
        .field("NAME", 1, FieldType::String)
        .field("COUNT", 2, FieldType::Long)
        .field("PRICE", 3, FieldType::Double)
        .field("RAW", 4, FieldType::Carray)
        .field("FLAG", 5, FieldType::Char)
        .field("SHORTV", 6, FieldType::Short)
        .field("INTV", 7, FieldType::Int)
        .field("FLOATV", 8, FieldType::Float)
}

/// The narrow fields plus the wide-only kinds.
pub fn wide_fixture_table() -> FieldTable {
    narrow_fixture_table()
        .field("TEXT", 9, FieldType::MbString)
        .field("PTR", 10, FieldType::Ptr)
        .field("REC", 11, FieldType::View)
        .field("SUB", 12, FieldType::Fml)
}

/// Register the fixture tables with both process-wide catalogs, once.
pub fn register_fixture_tables() {
    static REGISTER: Once = Once::new();
    REGISTER.call_once(|| {
        Narrow::catalog().register(narrow_fixture_table());
        Wide::catalog().register(wide_fixture_table());
    });
}

/// Resolve a fixture field, registering the tables first.
///
/// # Panics
///
/// When `name` is not a fixture field of this width.
pub fn fixture<W: Width>(name: &str) -> FieldId<W> {
    register_fixture_tables();
    W::catalog()
        .identifier_for(name)
        .unwrap_or_else(|e| panic!("fixture field {}: {}", name, e))
}
