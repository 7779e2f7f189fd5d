use anyhow::{Context, Result};
use clap::Parser;
use chrono::Utc;

use treehead_datastore::models::{PendingLeaf, TreeType};
use treehead_datastore::Model;
use treehead_sequencing::hashers::hasher_for;
use treehead_sequencing::storage::AdminStorage;

use super::{open_datastore, ConfigOpts};

#[derive(Debug, Parser)]
pub struct Opts {
    #[command(flatten)]
    config: ConfigOpts,

    #[clap(long)]
    log_id: i64,

    /// Leaf contents, taken as UTF-8 bytes.
    #[clap(long)]
    data: String,

    #[clap(long, default_value = "")]
    extra_data: String,
}

pub async fn run(opts: &Opts) -> Result<()> {
    let config = opts.config.load()?;
    let datastore = open_datastore(&config)?;

    let tree = datastore
        .resolve_log_config(opts.log_id, TreeType::Log)
        .await
        .with_context(|| format!("Cannot queue to log {}", opts.log_id))?;
    let hasher = hasher_for(&tree)?;

    let queued_at = Utc::now()
        .timestamp_nanos_opt()
        .context("System time out of range")?;
    let leaf_hash = hasher.hash_leaf(opts.data.as_bytes());
    let leaf = PendingLeaf::new(
        opts.log_id,
        opts.data.as_bytes(),
        &leaf_hash,
        opts.extra_data.as_bytes(),
        queued_at,
    );
    leaf.save(&datastore).await?;

    println!("{} {}", leaf.queue_id, leaf.leaf_hash);
    Ok(())
}
