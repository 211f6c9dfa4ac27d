use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::query::SUPPORTED_KIND;

/// Answers catalog and stream queries against a remote IPTV M3U playlist
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings of the playlist source, also readable from the environment or a `.env` file
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Location of the M3U playlist
    #[arg(
        long,
        env = "M3U_URL",
        default_value = "https://example.com/path/to/playlist.m3u"
    )]
    pub source: String,

    /// Seconds a fetched playlist is served before fetching it again
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 15 * 60)]
    pub cache_ttl: u64,

    /// Seconds before a playlist fetch is abandoned
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout: u64,
}

impl Config {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lists the channel categories of the playlist
    Categories,

    /// Lists the channels of a category
    Catalog {
        /// Category name, matched exactly
        genre: String,

        #[arg(long, default_value = SUPPORTED_KIND)]
        kind: String,
    },

    /// Lists the playable streams of a channel
    Streams {
        /// Channel id, with or without the namespace prefix
        id: String,

        #[arg(long, default_value = SUPPORTED_KIND)]
        kind: String,
    },
}
