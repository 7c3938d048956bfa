use clap::{Args, Subcommand};
use docmirror::{
    CollectionMirror, CollectionRef, DocumentMeta, DocumentRef, DocumentStore, FileStatus,
    Listener, Persistence, Query, RawDocument, RestStore,
};
use serde_json::Value;
use std::sync::Arc;

use super::runtime;
use crate::config::Config;

/// Read, write and watch documents
#[derive(Args)]
pub struct DocCommand {
    #[command(subcommand)]
    pub command: DocSubcommand,
}

#[derive(Subcommand)]
pub enum DocSubcommand {
    /// Print a document
    Get {
        /// Document path (collection/id)
        path: String,

        /// Read the local copy first
        #[arg(long)]
        cached: bool,
    },

    /// Merge JSON fields into a document, creating it if needed
    Put {
        /// Document path (collection/id)
        path: String,

        /// JSON object with the fields to write
        json: String,
    },

    /// Delete a document
    Delete {
        /// Document path (collection/id)
        path: String,
    },

    /// Mirror a collection and print it whenever it changes
    Watch {
        /// Collection path
        collection: String,

        /// Equality filter (can be repeated)
        #[arg(long = "where", value_name = "FIELD=VALUE")]
        filters: Vec<String>,

        /// Maximum number of documents
        #[arg(long)]
        limit: Option<usize>,
    },
}

impl DocCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let store: Arc<dyn DocumentStore> = Arc::new(RestStore::new(config.cloud()?)?);
        let rt = runtime()?;

        match &self.command {
            DocSubcommand::Get { path, cached } => {
                let target = bound(path)?;
                let persistence = Persistence::new(store);
                let doc = if *cached {
                    rt.block_on(persistence.pull_cached(&target))?
                } else {
                    rt.block_on(persistence.pull(&target))?
                };
                println!("{}", doc);
            }

            DocSubcommand::Put { path, json } => {
                let fields = match serde_json::from_str(json)? {
                    Value::Object(fields) => fields,
                    _ => return Err("fields must be a JSON object".into()),
                };
                let doc = RawDocument {
                    fields,
                    ..bound(path)?
                };
                rt.block_on(Persistence::new(store).push(&doc))?;
                println!("Saved {}", path);
            }

            DocSubcommand::Delete { path } => {
                rt.block_on(Persistence::new(store).delete(&bound(path)?))?;
                println!("Deleted {}", path);
            }

            DocSubcommand::Watch {
                collection,
                filters,
                limit,
            } => {
                let query = build_query(collection, filters, *limit)?;
                let status = Arc::new(FileStatus::open(config.status_path()));
                let mirror = CollectionMirror::<RawDocument>::new(
                    format!("watch:{}", collection),
                    store,
                    query,
                )
                .with_status(status)
                .on_update(|docs: &[RawDocument]| {
                    println!("--- {} document(s)", docs.len());
                    for doc in docs {
                        println!("{}", doc);
                    }
                });

                rt.block_on(async {
                    mirror.start();
                    let result = tokio::signal::ctrl_c().await;
                    mirror.stop();
                    result
                })?;
            }
        }

        Ok(())
    }
}

/// An empty raw document bound to `path`.
fn bound(path: &str) -> Result<RawDocument, Box<dyn std::error::Error>> {
    let reference = DocumentRef::parse(path)?;
    Ok(RawDocument {
        meta: DocumentMeta::with_reference(reference),
        ..Default::default()
    })
}

fn build_query(
    collection: &str,
    filters: &[String],
    limit: Option<usize>,
) -> Result<Query, Box<dyn std::error::Error>> {
    let mut query = Query::collection(CollectionRef::parse(collection)?);
    for filter in filters {
        let (field, raw) = filter
            .split_once('=')
            .ok_or_else(|| format!("invalid filter '{}', expected FIELD=VALUE", filter))?;
        query = query.where_eq(field, parse_value(raw));
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    Ok(query)
}

/// JSON literals keep their type; anything else is a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
