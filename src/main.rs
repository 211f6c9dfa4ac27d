#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use cache::SnapshotCache;
use config::{Cli, Command};
use playlist::HttpFetcher;
use query::{Catalog, strip_namespace};
use util::init_http_client;

pub mod cache;
pub mod config;
pub mod playlist;
pub mod query;
pub mod util;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    dotenvy::dotenv().ok();

    let Cli { config, command } = Cli::parse();
    info!("Using playlist {}", config.source);

    let client = init_http_client(config.fetch_timeout()).context("Building HTTP client")?;
    let cache = Arc::new(SnapshotCache::new(
        HttpFetcher::new(client),
        config.cache_ttl(),
    ));
    let catalog = Catalog::new(cache, config.source);

    let out = match command {
        Command::Categories => json!({ "genres": catalog.categories().await }),
        Command::Catalog { genre, kind } => {
            json!({ "metas": catalog.list_by_category(&kind, &genre).await })
        }
        Command::Streams { id, kind } => {
            json!({ "streams": catalog.streams_for(&kind, strip_namespace(&id)).await })
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&out).context("Serializing response")?
    );

    Ok(())
}
