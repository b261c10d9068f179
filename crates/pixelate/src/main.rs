//! Pixelate CLI - bulk mosaic pixelation on a concurrent worker pipeline.
//!
//! Every input image is tiled into square chunks, each chunk is replaced
//! by its mean color, and the result is written as PNG.
//!
//! # Usage
//!
//! ```bash
//! # Pixelate a single image with 16px blocks
//! pixelate run face.jpg --chunk-size 16
//!
//! # Pixelate a directory, keep going on bad files, write a report
//! pixelate run ./photos/ --recoverable --report report.jsonl --report-format jsonl
//!
//! # View configuration
//! pixelate config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Pixelate - bulk mosaic pixelation on a concurrent worker pipeline.
#[derive(Parser, Debug)]
#[command(name = "pixelate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Pixelate an image or a directory of images
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go straight to stderr.
    let config = match pixelate_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pixelate config path`."
            );
            pixelate_core::Config::default()
        }
    };
    logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);

    tracing::debug!("Pixelate v{}", pixelate_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
