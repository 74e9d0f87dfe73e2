//! CLI definition for ledgerd-testnet.

use clap::{Parser, Subcommand, ValueEnum};
use ledgerd_testnet::BuildPolicy;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Set up or tear down a bare-metal test network running `ledgerd` peers.
#[derive(Parser, Debug)]
#[command(name = "ledgerd-testnet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Available actions.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and run a test network, then wait for its genesis block.
    ///
    /// Meant to be run from the ledger project root; the peer processes
    /// keep running after this command returns.
    Setup {
        /// Number of peers to bootstrap.
        #[arg(default_value = "4")]
        n_peers: NonZeroUsize,

        /// Directory to store config, binaries and log files. Pass the same
        /// directory to `cleanup` later.
        #[arg(long, short, default_value = "./test")]
        out_dir: PathBuf,

        /// Host address used for every peer endpoint and in the discovery
        /// list. Ports are assigned automatically per peer.
        #[arg(long, short = 'i', default_value = "127.0.0.1")]
        host_ip: IpAddr,

        /// Ledger project root, used to locate binaries and config files.
        #[arg(long, short, default_value = ".")]
        root_dir: PathBuf,

        /// Seed each peer's key from its name, preserving key material
        /// between invocations.
        #[arg(long)]
        peer_name_as_seed: bool,

        /// What to do when a required binary is missing from the root
        /// directory.
        #[arg(long, value_enum, default_value_t = OnMissingBinary::Prompt)]
        on_missing_binary: OnMissingBinary,

        /// Extra KEY=VALUE entry for every peer's environment. Repeatable.
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_entry)]
        env: Vec<(String, String)>,
    },
    /// Kill all peer processes and remove the test directory.
    ///
    /// Process termination matches every process named like the peer
    /// binary, so proper caution is advised when several networks share a
    /// host.
    Cleanup {
        /// Directory the network was set up in.
        #[arg(long, short, default_value = "./test")]
        out_dir: PathBuf,
    },
}

/// Policy choice for binaries missing from the project root.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OnMissingBinary {
    /// Ask interactively before building.
    Prompt,
    /// Build without asking.
    Build,
    /// Abort the setup.
    Abort,
}

impl From<OnMissingBinary> for BuildPolicy {
    fn from(choice: OnMissingBinary) -> Self {
        match choice {
            OnMissingBinary::Prompt => Self::Prompt,
            OnMissingBinary::Build => Self::Build,
            OnMissingBinary::Abort => Self::Abort,
        }
    }
}

fn parse_env_entry(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}
