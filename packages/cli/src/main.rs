#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crime enrichment engine.
//!
//! Reads a JSON array of property listings, attaches a crime summary and
//! aggregate to every listing with a usable coordinate, and writes the
//! enriched array back out. Run without a subcommand for interactive
//! prompts.
//!
//! Uses `indicatif-log-bridge` (via [`crime_enrich_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::EnrichJob;

#[derive(Parser)]
#[command(name = "crime_enrich", about = "Crime enrichment for property listings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich a JSON array of property records
    Enrich {
        /// Input JSON file (array of property objects)
        #[arg(long)]
        input: PathBuf,
        /// Where to write the enriched array
        #[arg(long)]
        output: PathBuf,
        /// Also write a crime summaries report to this path
        #[arg(long)]
        summaries: Option<PathBuf>,
        /// Only process the first N records (for testing)
        #[arg(long)]
        max_items: Option<usize>,
        /// TOML config overriding the built-in defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Enrich a single coordinate and print the result
    Lookup {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Label used in the summary sentence
        #[arg(long)]
        label: Option<String>,
        /// TOML config overriding the built-in defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the months the next run would query
    Window {
        /// TOML config overriding the built-in defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_enrich_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Enrich {
            input,
            output,
            summaries,
            max_items,
            config,
        } => {
            let job = EnrichJob {
                input,
                output,
                summaries,
                max_items,
                config,
            };
            let stats = commands::enrich(&job, &multi).await?;
            println!("{stats}");
        }
        Commands::Lookup {
            lat,
            lng,
            label,
            config,
        } => commands::lookup(lat, lng, label, config.as_deref()).await?,
        Commands::Window { config } => commands::window(config.as_deref())?,
    }

    Ok(())
}
