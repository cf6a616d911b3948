use anyhow::Result;
use clap::Parser;
use log::info;

use julius_pos::cli::{Cli, CliHandler};
use julius_pos::config::NodeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = NodeConfig::load(&cli.config)?;
    info!("Loaded configuration from {}", cli.config.display());

    CliHandler::new(config).handle_command(cli.command).await
}
