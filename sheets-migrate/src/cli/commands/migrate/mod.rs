pub mod handler;

use clap::Args;

pub use handler::handle_migrate_command;

#[derive(Debug, Args)]
pub struct MigrateCommands {
    /// Spreadsheet id (Google source) or workbook path (xlsx source)
    #[arg(long)]
    pub sheet_id: String,

    /// Parse and report without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Leave customers and orders that already exist untouched
    #[arg(long)]
    pub skip_existing: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}
