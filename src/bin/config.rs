//! WRML Config CLI
//!
//! Show the effective configuration or write a starter config file.

use std::path::PathBuf;
use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wrml::WrmlConfig;

#[derive(Parser)]
#[command(name = "wrml-config")]
#[command(about = "Manage WRML runtime configuration")]
struct Cli {
    /// Config file (defaults to wrml.toml and the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Show,

    /// Write a config file with default values
    Init {
        /// Target file (defaults to ./wrml.toml)
        path: Option<PathBuf>,
        /// Write to the per-user config directory instead
        #[arg(long, conflicts_with = "path")]
        user: bool,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show => {
            let config = WrmlConfig::load_from(cli.config.as_deref().and_then(|p| p.to_str()))
                .context("loading configuration")?;
            print!("{}", toml::to_string_pretty(&config)?);
            if let Some(user) = WrmlConfig::user_config_path() {
                eprintln!("# user config: {}", user.display());
            }
            Ok(())
        }

        Commands::Init { path, user, force } => {
            let target = if user {
                WrmlConfig::user_config_path().context("no home directory for the user config")?
            } else {
                path.unwrap_or_else(|| PathBuf::from("wrml.toml"))
            };
            if target.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", target.display());
            }

            let target_str = target.to_str().context("config path is not valid UTF-8")?;
            WrmlConfig::default().save(target_str)?;
            println!("✅ Wrote default configuration to {}", target.display());
            Ok(())
        }
    }
}
