//! Configuration for the drop registry process
//!
//! Loaded from a TOML file (path in `DROPS_CONFIG`, optional), then
//! overridden by environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | DROPS_COLLECTION | drops | Document collection name |
//! | DROPS_DEFAULT_EXPIRATION_MS | 300000 | Lifetime of drops without a catalog timeout |
//! | DROPS_STORE_TYPE | in_memory | in_memory or local_fs |
//! | DROPS_DATA_PATH | ./data | LocalFs base directory |
//! | DROPS_CATALOG_PATH | - | Item catalog TOML |
//! | DROPS_LOG_LEVEL | info | Default log filter (RUST_LOG wins) |
//! | DROPS_LOG_JSON | false | JSON log lines |

use crate::drops::{RegistryConfig, DEFAULT_EXPIRATION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropsConfig {
    pub collection: String,
    #[serde(rename = "default_expiration_ms", with = "duration_millis")]
    pub default_expiration: Duration,
    pub store: StoreConfig,
    pub catalog_path: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl Default for DropsConfig {
    fn default() -> Self {
        DropsConfig {
            collection: "drops".to_string(),
            default_expiration: DEFAULT_EXPIRATION,
            store: StoreConfig::default(),
            catalog_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Type of document store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store (for tests and demos)
    InMemory,
    /// One JSON file per document
    LocalFs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    pub store_type: StoreType,
    /// Base directory for `local_fs`
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            store_type: StoreType::InMemory,
            path: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl DropsConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// File named by `DROPS_CONFIG` (or defaults), then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var("DROPS_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `DROPS_*` overrides from `lookup`
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(collection) = lookup("DROPS_COLLECTION") {
            self.collection = collection;
        }
        if let Some(value) = lookup("DROPS_DEFAULT_EXPIRATION_MS") {
            let ms = value.parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                var: "DROPS_DEFAULT_EXPIRATION_MS",
                value: value.clone(),
            })?;
            self.default_expiration = Duration::from_millis(ms);
        }
        if let Some(value) = lookup("DROPS_STORE_TYPE") {
            self.store.store_type = match value.to_lowercase().as_str() {
                "in_memory" | "memory" => StoreType::InMemory,
                "local_fs" | "localfs" => StoreType::LocalFs,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "DROPS_STORE_TYPE",
                        value,
                    })
                }
            };
        }
        if let Some(path) = lookup("DROPS_DATA_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("DROPS_CATALOG_PATH") {
            self.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup("DROPS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(value) = lookup("DROPS_LOG_JSON") {
            self.logging.json = value == "true" || value == "1";
        }
        Ok(self)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            collection: self.collection.clone(),
            default_expiration: self.default_expiration,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DropsConfig::default();
        assert_eq!(config.collection, "drops");
        assert_eq!(config.default_expiration, Duration::from_millis(300_000));
        assert_eq!(config.store.store_type, StoreType::InMemory);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = DropsConfig::from_toml_str(
            r#"
            default_expiration_ms = 60000

            [store]
            type = "local_fs"
            path = "/var/lib/drops"
            "#,
        )
        .unwrap();

        assert_eq!(config.collection, "drops");
        assert_eq!(config.default_expiration, Duration::from_secs(60));
        assert_eq!(config.store.store_type, StoreType::LocalFs);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/drops"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DROPS_COLLECTION", "world_drops"),
            ("DROPS_DEFAULT_EXPIRATION_MS", "1000"),
            ("DROPS_STORE_TYPE", "localfs"),
            ("DROPS_LOG_JSON", "1"),
        ]
        .into_iter()
        .collect();

        let config = DropsConfig::default()
            .apply_overrides(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.collection, "world_drops");
        assert_eq!(config.default_expiration, Duration::from_secs(1));
        assert_eq!(config.store.store_type, StoreType::LocalFs);
        assert!(config.logging.json);

        let registry = config.registry_config();
        assert_eq!(registry.collection, "world_drops");
        assert_eq!(registry.default_expiration, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_env_value() {
        let result = DropsConfig::default().apply_overrides(|var| {
            (var == "DROPS_DEFAULT_EXPIRATION_MS").then(|| "soon".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { var: "DROPS_DEFAULT_EXPIRATION_MS", .. })
        ));
    }
}
