mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tradepilot")]
#[command(about = "Browser-automation driver for a web trading console", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP control surface (long-running daemon)
    Dashboard {
        /// Host to bind to (overrides config dashboard.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config dashboard.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a scripted trading session: open, optional actions, close
    Drive {
        /// Read and print the quote panel snapshot
        #[arg(long)]
        data: bool,

        /// Capture a chart screenshot into the media directory
        #[arg(long)]
        screenshot: bool,

        /// Click a trade action by caption (repeatable, e.g. "Buy Mkt")
        #[arg(long)]
        trade: Vec<String>,

        /// Poll the notification ticker for the trade outcome after each action
        #[arg(long)]
        watch_status: bool,

        /// Keep the browser open until Ctrl-C instead of closing immediately
        #[arg(long)]
        keep_open: bool,
    },

    /// Show resolved paths, config summary, and detected browser
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Dashboard { host, port } => {
            commands::dashboard::run(host, port).await?;
        }
        Commands::Drive {
            data,
            screenshot,
            trade,
            watch_status,
            keep_open,
        } => {
            commands::drive::run(data, screenshot, trade, watch_status, keep_open).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
    }

    Ok(())
}
