use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{AssetCommand, ConfigCommand, DocCommand, StatusCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "docmirror")]
#[command(version)]
#[command(about = "Inspect mirrored cloud documents and cached asset URLs", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and manage remote assets
    Asset(AssetCommand),

    /// Read, write and watch documents
    Doc(DocCommand),

    /// Show which listeners are active
    Status(StatusCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docmirror=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    match &cli.command {
        Some(Commands::Asset(cmd)) => cmd.run(&config)?,
        Some(Commands::Doc(cmd)) => cmd.run(&config)?,
        Some(Commands::Status(cmd)) => cmd.run(&config)?,
        Some(Commands::Config(cmd)) => cmd.run(&config)?,
        None => println!("Use --help to see available commands"),
    }

    Ok(())
}
