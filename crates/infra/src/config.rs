//! Runtime settings.
//!
//! Sources, later ones override earlier ones:
//! 1. built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. `config/local.toml` (optional)
//! 4. environment variables with the `CLINICRX_` prefix and `__` as section separator,
//!    e.g. `CLINICRX_STORE__BACKEND=json_file`, `CLINICRX_API__BIND=0.0.0.0:8080`.

use std::path::{Path, PathBuf};

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use clinicrx_inventory::AllocationPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub billing: BillingSettings,
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub sources: SourceSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    JsonFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Store document; used by the `json_file` backend.
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("data/clinicrx.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Which batch a new medicine line draws from.
    pub allocation: AllocationPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub bind: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Optional JSON files feeding the external collaborators.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub prescriptions: Option<PathBuf>,
    pub test_catalog: Option<PathBuf>,
}

impl Settings {
    /// Load from `./config` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Load from `<dir>/default.toml`, `<dir>/local.toml` and the environment.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        ConfigBuilder::builder()
            .add_source(File::from(dir.join("default.toml")).required(false))
            .add_source(File::from(dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("CLINICRX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.billing.allocation, AllocationPolicy::EarliestExpiry);
        assert_eq!(settings.logging.filter, "info");
        assert!(settings.logging.json);
        assert_eq!(settings.api.bind, "127.0.0.1:8080");
        assert!(settings.sources.prescriptions.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let toml = r#"
            [store]
            backend = "json_file"
            path = "/var/lib/clinicrx/store.json"

            [billing]
            allocation = "receipt_order"

            [logging]
            json = false

            [sources]
            test_catalog = "catalog.json"
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.store.backend, StoreBackend::JsonFile);
        assert_eq!(settings.store.path, PathBuf::from("/var/lib/clinicrx/store.json"));
        assert_eq!(settings.billing.allocation, AllocationPolicy::ReceiptOrder);
        assert!(!settings.logging.json);
        assert_eq!(settings.logging.filter, "info");
        assert_eq!(settings.sources.test_catalog, Some(PathBuf::from("catalog.json")));
    }

    #[test]
    fn files_in_directory_are_layered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[api]\nbind = \"0.0.0.0:9000\"\n[logging]\nfilter = \"debug\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("local.toml"), "[logging]\nfilter = \"warn\"\n").unwrap();

        let settings = Settings::load_from(dir.path()).unwrap();
        assert_eq!(settings.api.bind, "0.0.0.0:9000");
        assert_eq!(settings.logging.filter, "warn");
    }
}
