//! CLI entry point for the folio rebalancer.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use folio_rebalancer::config::Config;
use folio_rebalancer::error::Error;
use folio_rebalancer::execution::{self, RunOptions};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Scheduled portfolio rebalancer: CSV observations → strategy → ledger")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the schedule and commit orders and holdings to the ledger
    Run {
        /// Evaluate without writing to the ledger
        #[arg(long)]
        dry_run: bool,

        /// Only run this portfolio id
        #[arg(long)]
        portfolio: Option<u32>,
    },

    /// Show the latest committed holdings
    Holdings {
        /// Only show this portfolio id
        #[arg(long)]
        portfolio: Option<u32>,
    },

    /// Validate config and market data
    Check,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Run { dry_run, portfolio } => {
            let opts = RunOptions {
                dry_run,
                portfolio,
                config_file: cli.config.display().to_string(),
            };
            execution::run(&config, &opts).map(|_| ())
        }
        Command::Holdings { portfolio } => execution::show_holdings(&config, portfolio),
        Command::Check => execution::check(&config).map(|_| println!("OK")),
    };

    if let Err(e) = result {
        match &e {
            Error::Engine(folio::Error::Persistence { date, .. }) => {
                eprintln!("\nStopped at {date}: {e}");
                process::exit(2);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
