//! UnitFlow CLI
//!
//! Command-line tools for exploring the UnitFlow write path.
//!
//! # Commands
//!
//! - `list` - List the reference scenarios
//! - `scenario` - Run a scenario and show the statements it issued

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// UnitFlow command-line tools.
#[derive(Parser)]
#[command(name = "unitflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (scheduler decisions are logged at debug)
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the reference scenarios
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a reference scenario on fresh in-memory databases
    Scenario {
        /// Scenario name (see `list`)
        name: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Exit with an error if the final run did not commit
        #[arg(long)]
        check: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List { format } => {
            commands::list::run(&format)?;
        }
        Commands::Scenario {
            name,
            format,
            check,
        } => {
            commands::scenario::run(&name, &format, check)?;
        }
        Commands::Version => {
            println!("UnitFlow CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("UnitFlow Core v{}", unitflow_core::VERSION);
        }
    }

    Ok(())
}
