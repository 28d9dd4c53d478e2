//! Stores: the composition root
//!
//! Opens every entity store under one data directory and hands out
//! references to them. There are no global singletons; whoever owns the
//! `Stores` value owns the files.
//!
//! ## Layout
//!
//! ```text
//! <data_dir>/
//!   planstore.toml
//!   plans.json
//!   users.json
//! ```

pub mod config;

pub use config::{StoreConfig, CONFIG_FILE_NAME};

use std::path::{Path, PathBuf};

use planstore_core::{StoreError, StoreResult};
use tracing::info;

use crate::primitives::{Plan, User};
use crate::store::{DocumentStore, StoreOptions};

/// Every store of one data directory
pub struct Stores {
    data_dir: PathBuf,
    config: StoreConfig,
    plans: DocumentStore<Plan>,
    users: DocumentStore<User>,
}

impl Stores {
    /// Open all stores in `data_dir`
    ///
    /// Creates the directory and a default `planstore.toml` if missing,
    /// then loads the config from it.
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        StoreConfig::write_default_if_missing(&config_path)?;
        let config = StoreConfig::from_file(&config_path)?;

        Self::open_with_config(data_dir, config)
    }

    /// Open all stores in `data_dir` with an explicit config
    ///
    /// The config file in the directory is neither read nor written.
    pub fn open_with_config(data_dir: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        if !data_dir.is_dir() {
            return Err(StoreError::config(format!(
                "'{}' is not a directory",
                data_dir.display()
            )));
        }

        // One capability probe shared by every store
        let options = StoreOptions::from_config(&config);

        let plans = DocumentStore::open(data_dir.join(&config.plans_file), options.clone())?;
        let users = DocumentStore::open(data_dir.join(&config.users_file), options)?;

        info!(
            target: "planstore::store",
            data_dir = %data_dir.display(),
            "Stores opened"
        );

        Ok(Stores {
            data_dir,
            config,
            plans,
            users,
        })
    }

    /// The plan store
    pub fn plans(&self) -> &DocumentStore<Plan> {
        &self.plans
    }

    /// The user store
    pub fn users(&self) -> &DocumentStore<User> {
        &self.users
    }

    /// Effective configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Close every store, draining queued writes
    pub fn close(&self) -> StoreResult<()> {
        self.plans.close()?;
        self.users.close()?;
        Ok(())
    }
}
