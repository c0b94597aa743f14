//! Item Catalog
//!
//! Static item metadata keyed by catalog identifier (`db_name`): display
//! name, world model and an optional expiration override for drops.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Static description of an item type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseItem {
    pub db_name: String,
    pub name: String,
    pub model: String,
    /// Drop lifetime override in milliseconds
    #[serde(default)]
    pub ms_timeout: Option<u64>,
}

impl BaseItem {
    pub fn new(db_name: &str, name: &str, model: &str) -> Self {
        BaseItem {
            db_name: db_name.to_string(),
            name: name.to_string(),
            model: model.to_string(),
            ms_timeout: None,
        }
    }

    pub fn with_timeout_ms(mut self, ms_timeout: u64) -> Self {
        self.ms_timeout = Some(ms_timeout);
        self
    }
}

/// Resolves catalog identifiers to item metadata. Lookups are synchronous
/// and side-effect free.
pub trait ItemCatalog: Send + Sync {
    fn base_item(&self, db_name: &str) -> Option<&BaseItem>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("item {0} defined more than once")]
    DuplicateItem(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    items: Vec<BaseItem>,
}

/// Catalog backed by a fixed map, built in code or loaded from TOML:
///
/// ```toml
/// [[items]]
/// db_name = "water_bottle"
/// name = "Water Bottle"
/// model = "prop_ld_flow_bottle"
/// ms_timeout = 1000
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticItemCatalog {
    items: AHashMap<String, BaseItem>,
}

impl StaticItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: BaseItem) -> Self {
        self.insert(item);
        self
    }

    /// Add or replace an item definition
    pub fn insert(&mut self, item: BaseItem) -> Option<BaseItem> {
        self.items.insert(item.db_name.clone(), item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(source)?;
        let mut catalog = StaticItemCatalog::new();
        for item in file.items {
            let db_name = item.db_name.clone();
            if catalog.insert(item).is_some() {
                return Err(CatalogError::DuplicateItem(db_name));
            }
        }
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let source = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

impl ItemCatalog for StaticItemCatalog {
    fn base_item(&self, db_name: &str) -> Option<&BaseItem> {
        self.items.get(db_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let catalog = StaticItemCatalog::new()
            .with_item(BaseItem::new("water_bottle", "Water Bottle", "prop_bottle").with_timeout_ms(1000));

        let item = catalog.base_item("water_bottle").unwrap();
        assert_eq!(item.name, "Water Bottle");
        assert_eq!(item.ms_timeout, Some(1000));
        assert!(catalog.base_item("nonexistent_item").is_none());
    }

    #[test]
    fn test_from_toml() {
        let catalog = StaticItemCatalog::from_toml_str(
            r#"
            [[items]]
            db_name = "water_bottle"
            name = "Water Bottle"
            model = "prop_ld_flow_bottle"
            ms_timeout = 1000

            [[items]]
            db_name = "burger"
            name = "Burger"
            model = "prop_cs_burger_01"
            "#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.base_item("burger").unwrap().ms_timeout, None);
    }

    #[test]
    fn test_duplicate_items_rejected() {
        let result = StaticItemCatalog::from_toml_str(
            r#"
            [[items]]
            db_name = "burger"
            name = "Burger"
            model = "a"

            [[items]]
            db_name = "burger"
            name = "Burger"
            model = "b"
            "#,
        );
        assert!(matches!(result, Err(CatalogError::DuplicateItem(name)) if name == "burger"));
    }
}
