//! ledgerd-testnet CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use ledgerd_testnet::{lifecycle, NetworkOptions};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let result = match cli.command {
        Command::Setup {
            n_peers,
            out_dir,
            host_ip,
            root_dir,
            peer_name_as_seed,
            on_missing_binary,
            env,
        } => {
            let options = NetworkOptions {
                peer_count: n_peers.get(),
                out_dir,
                root_dir,
                host: host_ip,
                peer_name_as_seed,
                build_policy: on_missing_binary.into(),
                extra_env: env,
            };
            lifecycle::setup(options).await.map(|_| ())
        }
        Command::Cleanup { out_dir } => lifecycle::cleanup(&out_dir).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(e.exit_code());
    }
    Ok(())
}
