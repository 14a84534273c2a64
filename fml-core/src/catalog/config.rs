//! Catalog configuration.

use crate::types::Width;
use std::path::PathBuf;

/// Where a catalog finds its field tables.
#[derive(Debug, Clone, Default)]
pub struct CatalogConfig {
    /// Field-table files, read in order on every (re)load.
    pub sources: Vec<PathBuf>,
}

impl CatalogConfig {
    /// A catalog with no file sources; tables come from `register` only.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read the table list from the width family's environment variable
    /// (`FML_FIELD_TABLES` or `FML_FIELD_TABLES32`), a platform path list.
    pub fn from_env<W: Width>() -> Self {
        let sources = std::env::var_os(W::TABLES_ENV)
            .map(|value| std::env::split_paths(&value).collect())
            .unwrap_or_default();
        Self { sources }
    }

    /// Add a table file.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_appends_sources_in_order() {
        let config = CatalogConfig::empty()
            .with_source("a.yaml")
            .with_source("b.fd");
        assert_eq!(
            config.sources,
            vec![PathBuf::from("a.yaml"), PathBuf::from("b.fd")]
        );
    }
}
