//! CLI command definitions.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use url::Url;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway server
    Serve(ServeArgs),

    /// Show the active gateway version
    Version,

    /// Activate the waiting version now
    SkipWaiting,

    /// Install a new version on a running gateway
    Install {
        /// Version tag
        tag: String,
    },

    /// Replay queued offline actions
    Sync {
        /// Sync tag
        #[arg(default_value = "background-sync")]
        tag: String,
    },

    /// Manage cache partitions
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Gateway configuration file (YAML)
    #[arg(short, long, env = "ENCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "ENCHAT_LISTEN")]
    pub listen: Option<String>,

    /// Upstream origin requests are forwarded to
    #[arg(short, long, env = "ENCHAT_UPSTREAM")]
    pub upstream: Option<Url>,

    /// Version tag to install
    #[arg(long, env = "ENCHAT_VERSION")]
    pub version_tag: Option<String>,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List partitions
    List,

    /// Delete a partition
    Clear {
        /// Partition name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Key
        key: String,

        /// Value
        value: String,
    },
}
