use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use quotekeeper::core::AssetType;
use quotekeeper::core::log::init_logging;

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

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Look up the current quote for one instrument
    Quote {
        /// fund, equity, metal or currency
        asset_type: AssetType,
        /// Instrument code, e.g. AFT, THYAO, GA, USD
        code: String,
    },
    /// Refresh prices of all configured holdings
    Refresh,
}

impl From<Commands> for quotekeeper::AppCommand {
    fn from(cmd: Commands) -> quotekeeper::AppCommand {
        match cmd {
            Commands::Quote { asset_type, code } => {
                quotekeeper::AppCommand::Quote { asset_type, code }
            }
            Commands::Refresh => quotekeeper::AppCommand::Refresh,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => quotekeeper::cli::setup::setup_at_path(path),
            None => quotekeeper::cli::setup::setup(),
        },
        Some(cmd) => quotekeeper::run_command(cmd.into(), cli.config_path.as_deref()).await,
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
