use anyhow::Result;
use clap::Parser;
use log::debug;

use sheets_migrate::cli::commands::{migrate, serve};
use sheets_migrate::cli::{Cli, Commands};
use sheets_migrate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    debug!("Using store {:?}, source {:?}", config.store.kind, config.source.kind);

    match cli.command {
        Commands::Migrate(args) => migrate::handle_migrate_command(args, &config).await,
        Commands::Serve(args) => serve::handle_serve_command(args, &config).await,
    }
}
