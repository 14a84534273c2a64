//! Core types for the field-buffer engine.
//!
//! - `FieldId`: a value-type tag and field number packed into one integer
//! - `FieldType`: the closed set of value kinds
//! - `Width`: the narrow/wide identifier families the engine is generic over

mod ids;
mod width;

pub use ids::{FieldId, FieldType};
pub use width::{Narrow, Wide, Width};
