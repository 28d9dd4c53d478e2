//! Store configuration via `planstore.toml`
//!
//! On first open, a default `planstore.toml` is created in the data
//! directory. To change settings, edit the file and reopen.

use planstore_core::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "planstore.toml";

/// Store configuration loaded from `planstore.toml`.
///
/// # Example
///
/// ```toml
/// sync_directory = true
/// pretty_json = true
/// plans_file = "plans.json"
/// users_file = "users.json"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Fsync the data directory after each rename.
    #[serde(default = "default_true")]
    pub sync_directory: bool,
    /// Pretty-print the JSON data files.
    #[serde(default = "default_true")]
    pub pretty_json: bool,
    /// Plan store file name, relative to the data directory.
    #[serde(default = "default_plans_file")]
    pub plans_file: String,
    /// User store file name, relative to the data directory.
    #[serde(default = "default_users_file")]
    pub users_file: String,
}

fn default_true() -> bool {
    true
}

fn default_plans_file() -> String {
    "plans.json".to_string()
}

fn default_users_file() -> String {
    "users.json".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_directory: true,
            pretty_json: true,
            plans_file: default_plans_file(),
            users_file: default_users_file(),
        }
    }
}

impl StoreConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# planstore configuration
#
# Fsync the data directory after every atomic rename (default: true).
# Filesystems that cannot sync directories are detected and skipped.
sync_directory = true

# Pretty-print the JSON data files (default: true)
pretty_json = true

# Data file names, relative to the data directory
plans_file = "plans.json"
users_file = "users.json"
"#
    }

    /// Check that the configured values are usable.
    ///
    /// # Errors
    ///
    /// Returns an error if a file name is empty, contains a path separator,
    /// or two stores would share one file.
    pub fn validate(&self) -> StoreResult<()> {
        for (key, name) in [("plans_file", &self.plans_file), ("users_file", &self.users_file)] {
            if name.trim().is_empty() {
                return Err(StoreError::config(format!("{} must not be empty", key)));
            }
            if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                return Err(StoreError::config(format!(
                    "{} must be a plain file name, got '{}'",
                    key, name
                )));
            }
        }
        if self.plans_file == self.users_file {
            return Err(StoreError::config(format!(
                "plans_file and users_file must differ, both are '{}'",
                self.plans_file
            )));
        }
        Ok(())
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            StoreError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StoreResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StoreError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StoreResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StoreError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_to_default() {
        let config: StoreConfig = toml::from_str(StoreConfig::default_toml()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        StoreConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = StoreConfig::from_file(&path).unwrap();
        assert!(config.sync_directory);
        assert_eq!(config.plans_file, "plans.json");
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "pretty_json = false\n").unwrap();
        StoreConfig::write_default_if_missing(&path).unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert!(!config.pretty_json);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn unparsable_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "pretty_json = \"maybe\"\n").unwrap();

        let err = StoreConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn validate_rejects_paths_and_collisions() {
        let mut config = StoreConfig::default();
        config.plans_file = "../plans.json".to_string();
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.users_file = "plans.json".to_string();
        assert!(config.validate().is_err());

        let mut config = StoreConfig::default();
        config.users_file = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = StoreConfig {
            sync_directory: false,
            pretty_json: false,
            plans_file: "training.json".to_string(),
            users_file: "accounts.json".to_string(),
        };
        config.write_to_file(&path).unwrap();

        assert_eq!(StoreConfig::from_file(&path).unwrap(), config);
    }
}
