//! cachelogin CLI entry point.

use cachelogin::config::AppConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

/// cachelogin - switch the Steam client between saved accounts
#[derive(Parser, Debug)]
#[command(name = "cachelogin")]
#[command(about = "Switch the Steam client between accounts using cached login tokens")]
#[command(version)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Switch to a saved account.
    Login(cli::switch::LoginCmd),

    /// Switch to an account using an explicit token.
    Switch(cli::switch::SwitchCmd),

    /// Manage saved accounts.
    #[command(subcommand, alias = "acc")]
    Accounts(cli::accounts::AccountsCmd),

    /// Import `username----token` lines from a file or stdin.
    Import(cli::accounts::ImportCmd),

    /// Export saved accounts as `username----token` lines.
    Export(cli::accounts::ExportCmd),

    /// Generate an account through the remote service and save it.
    Generate(cli::generate::GenerateCmd),

    /// Show the active account and install location.
    Status(cli::client::StatusCmd),

    /// Stop every client process.
    Kill(cli::client::KillCmd),

    /// Start the client.
    Start(cli::client::StartCmd),

    /// Wipe the client's local login state and restart it.
    Reset(cli::client::ResetCmd),

    /// Copy the client's login documents into the backup directory.
    Backup(cli::client::BackupCmd),

    /// Manage configuration.
    #[command(subcommand)]
    Config(cli::config::ConfigCmd),
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on RUST_LOG or the verbosity flag
    init_logging(cli.verbose);

    tracing::debug!(version = cachelogin::VERSION, "starting cachelogin");

    // Load configuration
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            AppConfig::default()
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Login(cmd) => cmd.run(&config),
        Commands::Switch(cmd) => cmd.run(&config),
        Commands::Accounts(cmd) => cmd.run(&config),
        Commands::Import(cmd) => cmd.run(&config),
        Commands::Export(cmd) => cmd.run(&config),
        Commands::Generate(cmd) => cmd.run(&config),
        Commands::Status(cmd) => cmd.run(&config),
        Commands::Kill(cmd) => cmd.run(&config),
        Commands::Start(cmd) => cmd.run(&config),
        Commands::Reset(cmd) => cmd.run(&config),
        Commands::Backup(cmd) => cmd.run(&config),
        Commands::Config(cmd) => cmd.run(config),
    };

    // Handle errors
    if let Err(e) = result {
        tracing::error!(error = %e, kind = %e.kind(), "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "cachelogin=debug"
    } else {
        "cachelogin=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
