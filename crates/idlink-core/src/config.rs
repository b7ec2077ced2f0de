//! Configuration loaded from `idlink.toml`.
//!
//! ```toml
//! [store]
//! path = "links.db"
//!
//! [tokens]
//! lifespan_secs = 86400
//!
//! [log]
//! filter = "info"
//! ```
//!
//! Every section is optional. `IDLINK_DB` overrides `store.path`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "idlink.toml";

/// Environment variable overriding the store path.
pub const DB_ENV_VAR: &str = "IDLINK_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LinkConfig {
    pub store: StoreConfig,
    pub tokens: TokenConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database holding link rows.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("links.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// How long an issued link token stays valid.
    pub lifespan_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            lifespan_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl LinkConfig {
    /// Parse a config document.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] if the TOML is malformed.
    pub fn from_toml(contents: &str) -> Result<Self, LinkError> {
        toml::from_str(contents).map_err(|e| LinkError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise fall back to defaults. A relative
    /// store path is resolved against the config file's directory; an
    /// `IDLINK_DB` override is taken as given.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .map_err(|e| LinkError::Config(format!("failed to read {}: {e}", path.display())))?;
            Self::from_toml(&contents)
                .map_err(|e| LinkError::Config(format!("failed to parse {}: {e}", path.display())))?
        } else {
            Self::default()
        };
        if config.store.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.store.path = dir.join(&config.store.path);
            }
        }
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load `idlink.toml` from `dir`.
    ///
    /// # Errors
    ///
    /// See [`LinkConfig::load`].
    pub fn load_from_dir(dir: &Path) -> Result<Self, LinkError> {
        Self::load(&dir.join(CONFIG_FILE_NAME))
    }

    /// Render as TOML, used by `idlink init`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, LinkError> {
        toml::to_string_pretty(self).map_err(|e| LinkError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(db) = std::env::var(DB_ENV_VAR) {
            if !db.trim().is_empty() {
                self.store.path = PathBuf::from(db);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = LinkConfig::from_toml("[tokens]\nlifespan_secs = 60\n").unwrap();
        assert_eq!(config.tokens.lifespan_secs, 60);
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.log.filter, "warn");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = LinkConfig::from_toml("[tokens\nlifespan_secs = ").unwrap_err();
        assert!(matches!(err, LinkError::Config(_)));
    }

    #[test]
    fn load_resolves_store_path_next_to_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[store]\npath = \"data/links.db\"\n",
        )
        .unwrap();

        let config = LinkConfig::load_from_dir(dir.path()).unwrap();
        if std::env::var(DB_ENV_VAR).is_err() {
            assert_eq!(config.store.path, dir.path().join("data/links.db"));
        }
    }

    #[test]
    fn relative_dir_resolves_store_path_once() {
        let config = LinkConfig::load_from_dir(Path::new("no-such-idlink-dir")).unwrap();
        if std::env::var(DB_ENV_VAR).is_err() {
            assert_eq!(config.store.path, Path::new("no-such-idlink-dir").join("links.db"));
        }

        let config = LinkConfig::load(Path::new("nested/conf/idlink.toml")).unwrap();
        if std::env::var(DB_ENV_VAR).is_err() {
            assert_eq!(config.store.path, Path::new("nested/conf/links.db"));
        }
    }

    #[test]
    fn toml_roundtrip_keeps_values() {
        let mut config = LinkConfig::default();
        config.tokens.lifespan_secs = 120;
        config.log.filter = "idlink=debug".to_string();

        let text = config.to_toml().unwrap();
        let back = LinkConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }
}
