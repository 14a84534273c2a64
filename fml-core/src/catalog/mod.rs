//! Field catalog: name and identifier resolution.
//!
//! A catalog turns human-readable field names into [`FieldId`]s and back.
//! Its name table is built lazily from its definition sources the first
//! time a name or identifier is resolved, and dropped again by
//! [`Catalog::unload`], after which the next resolution reloads it.
//!
//! Each width family has one process-wide catalog reachable through
//! [`Width::catalog`]; separate [`Catalog`] instances can be created for
//! isolated use. Resolution takes a read lock; loading, unloading and
//! registration take the write lock and so serialize with resolution.
//!
//! # Example
//!
//! ```ignore
//! use fml_core::prelude::*;
//!
//! Wide::catalog().register(FieldTable::new().field("NAME", 1, FieldType::String));
//! let id = Wide::catalog().identifier_for("NAME")?;
//! assert_eq!(Wide::catalog().name_for(id)?, "NAME");
//! ```

mod config;
mod table;

pub use config::CatalogConfig;
pub use table::{FieldDef, FieldTable};

use crate::arena::HEADER_SIZE;
use crate::error::{FmlError, Result};
use crate::types::{FieldId, FieldType, Width};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use table::TableSource;

/// The compiled name table.
struct NameTable<W: Width> {
    by_name: HashMap<String, FieldId<W>>,
    by_id: HashMap<FieldId<W>, String>,
}

impl<W: Width> NameTable<W> {
    fn build(sources: &[TableSource]) -> Result<Self> {
        let mut by_name: HashMap<String, FieldId<W>> = HashMap::new();
        let mut by_id = HashMap::new();

        for source in sources {
            for (name, number, field_type) in source.table.resolved() {
                let number = u32::try_from(number).unwrap_or(u32::MAX);
                let id = FieldId::<W>::new(field_type, number).map_err(|e| {
                    FmlError::TableLoad {
                        path: source.origin.clone(),
                        cause: format!("field '{}': {}", name, e),
                    }
                })?;

                match by_name.get(name) {
                    Some(existing) if *existing != id => {
                        return Err(FmlError::TableLoad {
                            path: source.origin.clone(),
                            cause: format!(
                                "field '{}' redefined as {}:{} (was {}:{})",
                                name,
                                field_type,
                                id.number(),
                                existing.field_type(),
                                existing.number()
                            ),
                        });
                    }
                    Some(_) => {}
                    None => {
                        by_name.insert(name.to_string(), id);
                        by_id.entry(id).or_insert_with(|| name.to_string());
                    }
                }
            }
        }

        Ok(Self { by_name, by_id })
    }
}

/// Resolves field names and identifiers for one width family.
pub struct Catalog<W: Width> {
    config: CatalogConfig,
    registered: RwLock<Vec<TableSource>>,
    cache: RwLock<Option<Arc<NameTable<W>>>>,
}

impl<W: Width> Catalog<W> {
    /// Create a catalog; nothing is loaded until the first resolution.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            registered: RwLock::new(Vec::new()),
            cache: RwLock::new(None),
        }
    }

    /// The catalog configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Add an in-memory table as a definition source.
    ///
    /// The cached name table is invalidated so the next resolution sees it.
    pub fn register(&self, table: FieldTable) {
        self.registered.write().push(TableSource {
            origin: PathBuf::from("<registered>"),
            table,
        });
        *self.cache.write() = None;
    }

    /// Drop the cached name table. The next resolution reloads every source.
    pub fn unload(&self) {
        let had_table = self.cache.write().take().is_some();
        if had_table {
            tracing::debug!(width = W::NAME, "Unloaded field catalog");
        }
    }

    /// Whether a name table is currently cached.
    pub fn is_loaded(&self) -> bool {
        self.cache.read().is_some()
    }

    /// Load the name table now if it is not cached.
    pub fn load(&self) -> Result<()> {
        self.table().map(|_| ())
    }

    fn table(&self) -> Result<Arc<NameTable<W>>> {
        if let Some(table) = self.cache.read().as_ref() {
            return Ok(Arc::clone(table));
        }

        let mut cache = self.cache.write();
        if let Some(table) = cache.as_ref() {
            return Ok(Arc::clone(table));
        }

        let mut sources = Vec::with_capacity(self.config.sources.len());
        for path in &self.config.sources {
            let table = FieldTable::from_path(path).inspect_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Field table unreadable");
            })?;
            sources.push(TableSource {
                origin: path.clone(),
                table,
            });
        }
        sources.extend(self.registered.read().iter().cloned());

        let table = Arc::new(NameTable::build(&sources)?);
        tracing::debug!(
            width = W::NAME,
            sources = sources.len(),
            fields = table.by_name.len(),
            "Loaded field catalog"
        );
        *cache = Some(Arc::clone(&table));
        Ok(table)
    }

    /// Resolve a name to its identifier.
    pub fn identifier_for(&self, name: &str) -> Result<FieldId<W>> {
        self.table()?
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| FmlError::UnknownName {
                name: name.to_string(),
            })
    }

    /// Resolve an identifier to its name.
    pub fn name_for(&self, id: FieldId<W>) -> Result<String> {
        self.table()?
            .by_id
            .get(&id)
            .cloned()
            .ok_or(FmlError::UnknownIdentifier { id: id.raw() })
    }

    /// Name lookup against the cached table only; never loads.
    pub fn cached_name(&self, id: FieldId<W>) -> Option<String> {
        self.cache
            .read()
            .as_ref()
            .and_then(|table| table.by_id.get(&id).cloned())
    }

    /// The field number of an identifier.
    pub fn ordinal_of(&self, id: FieldId<W>) -> u32 {
        id.number()
    }

    /// The declared value type of an identifier.
    pub fn value_type_of(&self, id: FieldId<W>) -> FieldType {
        id.field_type()
    }

    /// The type keyword of an identifier (e.g. `"string"`).
    pub fn type_name(&self, id: FieldId<W>) -> &'static str {
        id.field_type().keyword()
    }

    /// Build an identifier from a type and number.
    pub fn make_identifier(&self, field_type: FieldType, number: u32) -> Result<FieldId<W>> {
        FieldId::new(field_type, number)
    }

    /// Bytes a buffer needs to hold `entry_count` entries carrying
    /// `value_bytes` bytes of values in total.
    pub fn bytes_needed(entry_count: usize, value_bytes: usize) -> usize {
        HEADER_SIZE + entry_count * 2 * W::WORD_BYTES + value_bytes
    }

    /// Every known field, sorted by name.
    pub fn fields(&self) -> Result<Vec<(String, FieldId<W>)>> {
        let table = self.table()?;
        let mut fields: Vec<_> = table
            .by_name
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        fields.sort();
        Ok(fields)
    }

    /// Every known field name, sorted.
    pub fn field_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<_> = self.table()?.by_name.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl<W: Width> std::fmt::Debug for Catalog<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("width", &W::NAME)
            .field("sources", &self.config.sources)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
