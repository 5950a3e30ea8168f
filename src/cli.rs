use clap::{Parser, Subcommand};

use crate::commands;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "marketbreadth")]
#[command(about = "Market breadth analysis server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server with the background refresh worker
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 9876)]
        port: u16,
    },
    /// Recompute one snapshot kind (breadth, distribution, high_rise, unified) or all
    Refresh {
        /// Snapshot kind; omit to refresh everything
        kind: Option<String>,
    },
    /// Check whether an instrument closed at its trailing-window high
    Check {
        /// Instrument code with market suffix, e.g. 000001.SZ or AAPL.US
        code: String,
    },
    /// Show the latest cached snapshot dates
    Status,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await,
        Commands::Refresh { kind } => commands::refresh::run(kind).await,
        Commands::Check { code } => commands::check::run(&code).await,
        Commands::Status => commands::status::run().await,
    }
}
