use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use cryptodash::core::config::{MAX_CHART_INTERVAL_SECS, MIN_CHART_INTERVAL_SECS};
use cryptodash::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for cryptodash::AppCommand {
    fn from(cmd: Commands) -> cryptodash::AppCommand {
        match cmd {
            Commands::Dashboard { interval, once } => {
                cryptodash::AppCommand::Dashboard { interval, once }
            }
            Commands::Portfolio => cryptodash::AppCommand::Portfolio,
            Commands::Ingest => cryptodash::AppCommand::Ingest,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Live price charts, portfolio and headlines
    Dashboard {
        /// Chart refresh interval in seconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(MIN_CHART_INTERVAL_SECS..=MAX_CHART_INTERVAL_SECS))]
        interval: Option<u64>,
        /// Render a single frame and exit
        #[arg(long)]
        once: bool,
    },
    /// Display portfolio valuation
    Portfolio,
    /// Fetch the news feed and archive it to object storage
    Ingest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => cryptodash::cli::setup::setup(),
        Some(cmd) => cryptodash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
