mod asset;
mod config_cmd;
mod doc;
mod status;

pub use asset::AssetCommand;
pub use config_cmd::ConfigCommand;
pub use doc::DocCommand;
pub use status::StatusCommand;

use clap::ValueEnum;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Runtime for commands that talk to the backends.
fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
}
