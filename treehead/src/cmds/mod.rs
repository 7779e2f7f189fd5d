pub mod create_id;
pub mod create_log;
pub mod queue_leaf;
pub mod sequence;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use treehead_datastore::LogDatastore;

use crate::config_file::{self, Config};

/// Flags shared by every command that touches the datastore.
#[derive(Debug, Args)]
pub struct ConfigOpts {
    #[clap(long, default_value = "./config.json")]
    config: PathBuf,

    /// Overrides `storage` from the config file.
    #[clap(long, env = "TREEHEAD_STORAGE")]
    storage: Option<PathBuf>,
}

impl ConfigOpts {
    pub fn load(&self) -> Result<Config> {
        let mut config =
            config_file::read_or_create_config(&self.config).context("Failed to read config")?;
        if let Some(storage) = &self.storage {
            config.storage = Some(storage.clone());
        }
        log::debug!("Config: {:?}", config);
        Ok(config)
    }
}

pub fn open_datastore(config: &Config) -> Result<LogDatastore> {
    let path = config.storage_path();
    LogDatastore::new(&path).with_context(|| format!("Failed to open datastore at {}", path.display()))
}
