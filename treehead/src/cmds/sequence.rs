use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use treehead_sequencing::signer::KeyDirSignerFactory;
use treehead_sequencing::time_source::SystemTimeSource;
use treehead_sequencing::{PassInfo, Registry, SequencerManager};

use super::{open_datastore, ConfigOpts};

#[derive(Debug, Parser)]
pub struct Opts {
    #[command(flatten)]
    config: ConfigOpts,

    /// Runs one pass for each listed log.
    #[clap(long, required = true, num_args = 1..)]
    log_id: Vec<i64>,

    /// Overrides `batch_size` from the config file.
    #[clap(long)]
    batch_size: Option<usize>,

    /// Overrides `guard_window_ms` from the config file.
    #[clap(long)]
    guard_window_ms: Option<u64>,
}

pub async fn run(opts: &Opts) -> Result<()> {
    let mut config = opts.config.load()?;
    if opts.guard_window_ms.is_some() {
        config.guard_window_ms = opts.guard_window_ms;
    }
    let datastore = Arc::new(open_datastore(&config)?);

    let signer_factory = Arc::new(KeyDirSignerFactory::new(&config.key_dir_path()));
    let registry = Registry::with_datastore(datastore, signer_factory);
    let manager = SequencerManager::new(registry, config.sequencer_config());
    let info = PassInfo {
        batch_size: opts.batch_size.unwrap_or_else(|| config.batch_size()),
        time_source: Arc::new(SystemTimeSource),
    };

    // ctrl-c lets an in-flight pass finish or abort before its commit
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    log::info!(
        "{}: guard window {:?}, batch size {}",
        manager.name(),
        manager.config().guard_window,
        info.batch_size
    );

    let mut failed = 0;
    for log_id in &opts.log_id {
        match manager.execute_pass(&cancel, *log_id, &info).await {
            Ok(count) => println!("log {}: sequenced {} leaves", log_id, count),
            Err(e) => {
                log::error!("{} (retryable: {})", e, e.source.is_retryable());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} passes failed", failed, opts.log_id.len());
    }
    Ok(())
}
