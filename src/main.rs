use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ratefeed::cli::setup::{setup, setup_at_path};
use ratefeed::core::log::init_logging;

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

impl From<Commands> for ratefeed::AppCommand {
    fn from(cmd: Commands) -> ratefeed::AppCommand {
        match cmd {
            Commands::Run => ratefeed::AppCommand::Run,
            Commands::Update { company } => ratefeed::AppCommand::Update { company },
            Commands::Rates { company } => ratefeed::AppCommand::Rates { company },
            Commands::Companies => ratefeed::AppCommand::Companies,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Update rates for every company that is due (run this from a timer)
    Run,
    /// Update rates now without changing the schedule
    Update {
        /// Only update this company
        #[arg(long)]
        company: Option<String>,
    },
    /// List recorded rates
    Rates {
        /// Only show rates of this company
        #[arg(long)]
        company: Option<String>,
    },
    /// Show company rate settings and schedules
    Companies,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => setup_at_path(path),
            None => setup(),
        },
        Some(cmd) => ratefeed::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
