//! Prelude for convenient imports.
//!
//! # Example
//!
//! ```ignore
//! use fml_core::prelude::*;
//! ```

// Core types
pub use crate::types::{FieldId, FieldType, Narrow, Wide, Width};
pub use crate::value::{FromValue, MbString, PtrOwnership, PtrValue, Value, ViewRecord};

// Error handling
pub use crate::error::{FmlError, Result};

// Storage
pub use crate::arena::{ArenaAllocator, ArenaConfig, BufferKind, HeapArena, default_arena};

// Catalog
pub use crate::catalog::{Catalog, CatalogConfig, FieldDef, FieldTable};

// Buffers
pub use crate::buffer::{
    DEFAULT_INDEX_INTERVAL, ExportMode, FieldBuffer, Fml16, Fml32, MAX_NESTING_DEPTH,
};

// Expressions
pub use crate::expr::{ArithExpr, BoolExpr, MAX_EXPR_DEPTH};
