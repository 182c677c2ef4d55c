use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::models::{CatalogEntry, Category, validate_catalog_entry};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Immutable, pre-loaded list of reference foods.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog from entries, rejecting invalid or duplicate ids.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            validate_catalog_entry(entry)?;
            if !seen.insert(entry.id) {
                bail!("Duplicate catalog id {}", entry.id);
            }
        }
        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(json).context("Failed to parse catalog JSON")?;
        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog = Self::from_json(&json)
            .with_context(|| format!("Invalid catalog {}", path.display()))?;
        debug!(path = %path.display(), entries = catalog.len(), "loaded catalog");
        Ok(catalog)
    }

    /// The catalog compiled into the library.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("Built-in catalog is invalid")
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Exact, case-insensitive name lookup.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&CatalogEntry> {
        let name = name.trim();
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive substring search over name and brand. Prefix matches come first.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&CatalogEntry> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return self.entries.iter().collect();
        }
        let mut hits: Vec<&CatalogEntry> = self
            .entries
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&q)
                    || e.brand
                        .as_deref()
                        .is_some_and(|b| b.to_lowercase().contains(&q))
            })
            .collect();
        hits.sort_by_key(|e| (!e.name.to_lowercase().starts_with(&q), e.name.to_lowercase()));
        hits
    }

    #[must_use]
    pub fn by_category(&self, category: Category) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .collect()
    }
}
