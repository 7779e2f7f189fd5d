mod cmds;
mod config_file;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "treehead")]
#[command(version = "0.1.0")]
#[command(about = "Sequence and sign verifiable logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(alias = "create_id")]
    CreateId(cmds::create_id::Opts),

    #[command(alias = "create_log")]
    CreateLog(cmds::create_log::Opts),

    #[command(alias = "queue_leaf")]
    QueueLeaf(cmds::queue_leaf::Opts),

    Sequence(cmds::sequence::Opts),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::CreateId(opts) => cmds::create_id::run(opts).await?,
        Commands::CreateLog(opts) => cmds::create_log::run(opts).await?,
        Commands::QueueLeaf(opts) => cmds::queue_leaf::run(opts).await?,
        Commands::Sequence(opts) => cmds::sequence::run(opts).await?,
    }

    Ok(())
}
