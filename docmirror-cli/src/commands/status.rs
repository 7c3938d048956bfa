use clap::Args;
use docmirror::FileStatus;

use super::OutputFormat;
use crate::config::Config;

/// Show which listeners are active
#[derive(Args)]
pub struct StatusCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl StatusCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let path = config.status_path();
        let flags = FileStatus::read(&path)?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&flags)?),
            OutputFormat::Text => {
                println!("Listener Status");
                println!("===============");
                println!();

                if flags.is_empty() {
                    println!("No listeners recorded in {}", path.display());
                }
                for (name, active) in &flags {
                    let state = if *active { "✓ active" } else { "  stopped" };
                    println!("  {} {}", state, name);
                }
            }
        }

        Ok(())
    }
}
