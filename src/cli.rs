use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Console dashboard for a fleet of network probe agents", long_about = None)]
pub struct Cli {
    /// Show one client instead of the fleet dashboard.
    #[arg(long, value_name = "ID", conflicts_with = "server_config")]
    pub client: Option<String>,
    /// Open a configuration file on the selected client.
    #[arg(long, value_name = "PATH", requires = "client")]
    pub edit: Option<String>,
    /// Replace the opened file with this local file and save it.
    #[arg(long, value_name = "LOCAL_FILE", requires = "edit")]
    pub from: Option<PathBuf>,
    /// Show what would be saved, then discard.
    #[arg(long, requires = "from")]
    pub dry_run: bool,
    /// Refresh once, print, and exit.
    #[arg(long)]
    pub once: bool,
    /// Print the server configuration and exit.
    #[arg(long)]
    pub server_config: bool,
}
