use anyhow::Context;
use binopt_core::config_loader::DEFAULT_CONFIG_PATH;
use binopt_core::ConfigLoader;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod context;
mod logging;

use commands::{ForceExpireArgs, RecordArgs, ShowArgs};

#[derive(Parser)]
#[command(name = "binopt")]
#[command(about = "Settlement and reconciliation engine for binary-option bets", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, env = "BINOPT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Profile overlay, loaded from Config.<profile>.toml next to the config file
    #[arg(long, global = true, env = "BINOPT_PROFILE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scanner and resolver on their intervals until Ctrl-C
    Run,
    /// Run one settlement tick and exit
    Scan,
    /// Run one identifier-resolution tick and exit
    Resolve,
    /// Record a newly placed bet priced at the oracle
    Record(RecordArgs),
    /// Close an unresolved bet whose creating transaction never confirmed
    ForceExpire(ForceExpireArgs),
    /// Print a bet from the ledger
    Show(ShowArgs),
    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_from(&cli.config, cli.profile.as_deref())
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    logging::init(&config.logging)?;

    match cli.command {
        Commands::Run => commands::run_daemon(&config).await?,
        Commands::Scan => commands::run_scan(&config).await?,
        Commands::Resolve => commands::run_resolve(&config).await?,
        Commands::Record(args) => commands::run_record(&config, args).await?,
        Commands::ForceExpire(args) => commands::run_force_expire(&config, args).await?,
        Commands::Show(args) => commands::run_show(&config, args).await?,
        Commands::Migrate => commands::run_migrate(&config).await?,
    }

    Ok(())
}
