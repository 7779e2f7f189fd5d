use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use treehead_datastore::models::{HashStrategy, LogTree};
use treehead_datastore::Model;

use super::{open_datastore, ConfigOpts};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Hash {
    Sha256,
    Sha512,
}

impl From<Hash> for HashStrategy {
    fn from(hash: Hash) -> Self {
        match hash {
            Hash::Sha256 => HashStrategy::Rfc6962Sha256,
            Hash::Sha512 => HashStrategy::Rfc6962Sha512,
        }
    }
}

#[derive(Debug, Parser)]
pub struct Opts {
    #[command(flatten)]
    config: ConfigOpts,

    #[clap(long)]
    log_id: i64,

    /// Name of the signing key in the key directory.
    #[clap(long)]
    key_id: String,

    #[clap(long, value_enum, default_value = "sha256")]
    hash: Hash,

    #[clap(long)]
    display_name: Option<String>,
}

pub async fn run(opts: &Opts) -> Result<()> {
    let config = opts.config.load()?;
    let datastore = open_datastore(&config)?;

    if LogTree::find_by_id(&datastore, opts.log_id).await?.is_some() {
        anyhow::bail!("Log {} already exists", opts.log_id);
    }

    let mut tree = LogTree::new(opts.log_id, &opts.key_id, opts.hash.into());
    tree.display_name = opts.display_name.clone();
    tree.save(&datastore)
        .await
        .with_context(|| format!("Failed to save log {}", opts.log_id))?;

    log::info!("Created log {} signed by key {}", opts.log_id, opts.key_id);
    Ok(())
}
