//! Command-line interface

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::migrate::MigrateCommands;
use commands::serve::ServeCommands;

#[derive(Debug, Parser)]
#[command(name = "sheets-migrate", version, about = "Import order sheets into Supabase tables")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "SHEETS_MIGRATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one migration and print the result
    Migrate(MigrateCommands),
    /// Serve the HTTP migration trigger
    Serve(ServeCommands),
}
