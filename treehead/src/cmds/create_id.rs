use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use treehead_utils::keypair::Keypair;

#[derive(Debug, Parser)]
pub struct Opts {
    /// Key id; the key is written to `<dir>/<name>.keypair.json`.
    #[clap(long)]
    name: String,

    #[clap(long, default_value = ".")]
    dir: PathBuf,
}

pub async fn run(opts: &Opts) -> Result<()> {
    let keypair = Keypair::generate().context("Failed to generate keypair")?;

    let filepath = opts.dir.join(format!("{}.keypair.json", opts.name));
    if filepath.exists() {
        return Err(anyhow::anyhow!(
            "Key file already exists at {}. Please choose a different name or remove the existing file.",
            filepath.display()
        ));
    }

    keypair
        .as_json_file(&filepath)
        .with_context(|| format!("Failed to save keypair to {}", filepath.display()))?;

    println!("Created key {}", opts.name);
    println!("Private key saved to: {}", filepath.display());
    println!("Public address: {}", keypair.as_public_address());

    Ok(())
}
