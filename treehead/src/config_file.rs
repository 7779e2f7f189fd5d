use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use treehead_sequencing::{HeartbeatPolicy, SequencerConfig};

pub const DEFAULT_GUARD_WINDOW_MS: u64 = 1000;
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    pub storage: Option<PathBuf>,
    pub key_dir: Option<PathBuf>,
    pub guard_window_ms: Option<u64>,
    pub batch_size: Option<usize>,
    /// Re-sign an unchanged tree once its head is this old.
    pub max_root_age_secs: Option<u64>,
}

impl Config {
    pub fn storage_path(&self) -> PathBuf {
        self.storage.clone().unwrap_or_else(|| PathBuf::from("./data"))
    }

    pub fn key_dir_path(&self) -> PathBuf {
        self.key_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            guard_window: Duration::from_millis(self.guard_window_ms.unwrap_or(DEFAULT_GUARD_WINDOW_MS)),
            heartbeat: match self.max_root_age_secs {
                Some(secs) => HeartbeatPolicy::MaxRootAge(Duration::from_secs(secs)),
                None => HeartbeatPolicy::Never,
            },
        }
    }
}

pub fn read_or_create_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let file = fs::File::open(path)
            .context("Failed to open config file")?;
        let config: Config = serde_json::from_reader(file)
            .context("Failed to parse config file")?;
        Ok(config)
    } else {
        let config = Config::default();
        let file = fs::File::create(path)
            .context("Failed to create config file")?;
        serde_json::to_writer_pretty(file, &config)
            .context("Failed to write default config file")?;
        Ok(config)
    }
}
