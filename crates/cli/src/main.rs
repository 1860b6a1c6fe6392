//! blockcache command line entry point.
//!
//! Logs go to stderr; block summaries and reports go to stdout.

use anyhow::{Context, Result};
use blockcache_client::{ExplorerClient, ExplorerConfig};
use blockcache_core::AppConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = AppConfig::load().context("loading configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("validating configuration")?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Command::Download(args) => {
            let source = ExplorerClient::new(ExplorerConfig::from(&config)).context("building explorer client")?;
            commands::download(&config, source, args).await
        }
        Command::Clear => commands::clear(&config).await,
        Command::List => commands::list(&config).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
