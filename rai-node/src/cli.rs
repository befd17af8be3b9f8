use clap::{Parser, Subcommand};

/// RaiBlocks light peer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// UDP port to listen on (0 picks a random port)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Bootstrap peers as host:port, comma separated
    #[arg(short, long, value_delimiter = ',', global = true)]
    pub bootstrap: Option<Vec<String>>,

    /// Connect to the test network
    #[arg(long, global = true)]
    pub testnet: bool,

    /// Decode and verify every vote instead of stopping at the account
    #[arg(long, global = true)]
    pub full_votes: bool,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Path to the log file (optional). If not provided, logs will only go to stdout.
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Gossip with the network and log what arrives (default)
    Run,
    /// Fetch the chain of an account and print it as JSON
    Pull {
        /// Account public key, 64 hex characters
        account: String,
    },
}
