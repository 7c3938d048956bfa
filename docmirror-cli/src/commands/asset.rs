use clap::{Args, Subcommand};
use docmirror::{AssetResolver, LocatorStore, ObjectStore, RestObjectStore};
use std::path::PathBuf;
use std::sync::Arc;

use super::{runtime, OutputFormat};
use crate::config::Config;

/// Resolve and manage remote assets
#[derive(Args)]
pub struct AssetCommand {
    #[command(subcommand)]
    pub command: AssetSubcommand,
}

#[derive(Subcommand)]
pub enum AssetSubcommand {
    /// Resolve an asset key to its download URL
    Resolve {
        /// Asset key the URL is cached under
        key: String,

        /// Object path inside the storage bucket
        path: String,
    },

    /// Forget the cached URL of an asset
    Evict {
        key: String,
    },

    /// Forget every cached URL
    Clear,

    /// List cached URLs
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Upload a local file to the storage bucket
    Upload {
        /// Object path inside the storage bucket
        path: String,

        /// Local file to upload
        file: PathBuf,

        /// Content type sent with the upload
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
}

impl AssetCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let records = LocatorStore::new(config.assets_dir());

        match &self.command {
            AssetSubcommand::Resolve { key, path } => {
                let objects = RestObjectStore::new(config.storage()?)?;
                let resolver = AssetResolver::new(Arc::new(objects), records);
                match runtime()?.block_on(resolver.try_resolve(key, path))? {
                    Some(url) => println!("{}", url),
                    None => println!("Asset not found: {}", path),
                }
            }

            AssetSubcommand::Evict { key } => {
                if records.remove(key)? {
                    println!("Evicted {}", key);
                } else {
                    println!("No cached URL for {}", key);
                }
            }

            AssetSubcommand::Clear => {
                let removed = records.clear()?;
                println!(
                    "Removed {} cached URL{}",
                    removed,
                    if removed == 1 { "" } else { "s" }
                );
            }

            AssetSubcommand::List { format } => {
                let list = records.list()?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&list)?),
                    OutputFormat::Text => {
                        if list.is_empty() {
                            println!("No cached URLs.");
                        }
                        for record in list {
                            println!(
                                "{}  {}  {}",
                                record.saved_at.format("%Y-%m-%d %H:%M"),
                                record.key,
                                record.url
                            );
                        }
                    }
                }
            }

            AssetSubcommand::Upload {
                path,
                file,
                content_type,
            } => {
                let bytes = std::fs::read(file)?;
                let objects = RestObjectStore::new(config.storage()?)?;
                let meta = runtime()?.block_on(objects.upload(path, bytes, content_type))?;
                println!("Uploaded {} ({} bytes)", meta.path, meta.size);
                if let Some(url) = meta.download_url {
                    println!("{}", url);
                }
            }
        }

        Ok(())
    }
}
