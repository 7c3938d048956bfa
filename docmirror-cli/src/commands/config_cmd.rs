use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("project_id: {}", config.project_id.value);
                        println!("  source: {}", config.project_id.source);
                        println!();

                        println!("storage_bucket: {}", config.storage_bucket.value);
                        println!("  source: {}", config.storage_bucket.source);
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("api_key: {}", set_or_not(&config.api_key));
                        println!("auth_token: {}", set_or_not(&config.auth_token));
                        println!("poll_interval_ms: {}", config.poll_interval_ms);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'docmirror config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let default_config = r#"# docmirror configuration

# Cloud project holding the document database
project_id: ""

# Storage bucket for assets (e.g. my-project.appspot.com)
storage_bucket: ""

# Where cached asset URLs and listener status live
# (default: ~/.local/share/docmirror)
# data_dir: ~/.local/share/docmirror

# Prefer the DOCMIRROR_API_KEY and DOCMIRROR_TOKEN environment variables
# api_key: ""

# How often watched queries are re-run
poll_interval_ms: 5000
"#;

                let mut file = fs::File::create(&config_path)?;
                file.write_all(default_config.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn set_or_not(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "(set)"
    } else {
        "(not set)"
    }
}
