//! FML Core Library
//!
//! Self-describing, multiset-valued field buffers: a binary record of typed
//! fields where each field may occur any number of times, stored in one
//! growable arena block and addressed by `(field, occurrence)`.
//!
//! # Key Components
//!
//! - **Arena**: growable single-owner blocks backing every buffer
//! - **Catalog**: field tables mapping names to typed identifiers
//! - **Buffer**: the field buffer engine with its sparse index, multiset
//!   algebra, text dump and export framing
//! - **Expr**: compiled boolean and arithmetic expressions over fields
//!
//! Two width families share the engine: [`Narrow`] (16-bit identifiers,
//! scalar and text kinds) and [`Wide`] (32-bit identifiers, adding nested
//! buffers, pointers, multi-byte strings and embedded records).
//!
//! # Example
//!
//! ```ignore
//! use fml_core::prelude::*;
//!
//! Wide::catalog().register(
//!     FieldTable::new()
//!         .field("NAME", 1, FieldType::String)
//!         .field("COUNT", 2, FieldType::Long),
//! );
//! let name = Wide::catalog().identifier_for("NAME")?;
//!
//! let mut buf = Fml32::new();
//! buf.add(name, "hello")?;
//! buf.add(name, "world")?;
//!
//! let expr = BoolExpr::<Wide>::compile("NAME[?] %% 'w.*'")?;
//! assert!(expr.eval(&buf)?);
//!
//! let wire = buf.export(ExportMode::TextSafe)?;
//! let back = Fml32::import(&wire, ExportMode::TextSafe)?;
//! assert_eq!(back, buf);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod buffer;
pub mod catalog;
pub mod error;
pub mod expr;
pub mod prelude;
pub mod testing;
pub mod types;
pub mod value;

// Re-export key types at crate root for convenience
pub use arena::{ArenaAllocator, ArenaConfig, HeapArena};
pub use buffer::{ExportMode, FieldBuffer, Fml16, Fml32};
pub use catalog::{Catalog, CatalogConfig, FieldTable};
pub use error::{FmlError, Result};
pub use expr::{ArithExpr, BoolExpr};
pub use types::{FieldId, FieldType, Narrow, Wide, Width};
pub use value::Value;
