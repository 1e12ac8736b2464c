use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "accounts", about = "Manage launcher accounts")]
struct Cli {
    /// Directory holding accounts.json (overrides config.toml)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered account types
    Types,

    /// List accounts
    List {
        /// Filter by account type (e.g. mojang)
        account_type: Option<String>,
    },

    /// Log in and add a new account
    Add {
        /// Account type (e.g. mojang)
        account_type: String,
        /// Login name (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Log out and remove an account
    Remove {
        /// Account username
        account: String,
        /// Account type, when the username is ambiguous
        #[arg(short = 't', long = "type")]
        account_type: Option<String>,
    },

    /// Make an account the default for its type
    Default {
        /// Account username
        account: String,
        #[arg(short = 't', long = "type")]
        account_type: Option<String>,
    },

    /// Clear the default account of a type
    UnsetDefault {
        account_type: String,
    },

    /// Validate an account's session, refreshing tokens if needed
    Check {
        /// Account username
        account: String,
        #[arg(short = 't', long = "type")]
        account_type: Option<String>,
    },

    /// Show where accounts are stored and how they loaded
    Status,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();

    let result = match &cli.command {
        Commands::Types => cli::commands::cmd_types(data_dir),
        Commands::List { account_type } => cli::commands::cmd_list(data_dir, account_type.as_deref()),
        Commands::Add {
            account_type,
            username,
        } => cli::commands::cmd_add(data_dir, account_type, username.as_deref()),
        Commands::Remove {
            account,
            account_type,
        } => cli::commands::cmd_remove(data_dir, account, account_type.as_deref()),
        Commands::Default {
            account,
            account_type,
        } => cli::commands::cmd_default(data_dir, account, account_type.as_deref()),
        Commands::UnsetDefault { account_type } => cli::commands::cmd_unset_default(data_dir, account_type),
        Commands::Check {
            account,
            account_type,
        } => cli::commands::cmd_check(data_dir, account, account_type.as_deref()),
        Commands::Status => cli::commands::cmd_status(data_dir),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
