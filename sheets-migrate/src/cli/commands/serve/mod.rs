pub mod handler;

use clap::Args;

pub use handler::handle_serve_command;

#[derive(Debug, Args)]
pub struct ServeCommands {
    /// Address to listen on (overrides server.bind)
    #[arg(long)]
    pub bind: Option<String>,
}
