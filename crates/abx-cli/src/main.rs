use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod discover;
mod export;
mod fetch;
mod items;
mod login;
mod select;

#[derive(Debug, Parser)]
#[command(name = "abx")]
#[command(about = "Bulk product extraction from the merchant back office")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Force a fresh login for each selected account and persist the cookies.
    Login {
        /// Account id; repeatable. Default: every account with credentials.
        #[arg(long = "account")]
        accounts: Vec<String>,
    },
    /// Discover catalog factories and lister collections.
    Discover {
        #[arg(long = "account")]
        accounts: Vec<String>,
        #[arg(long, value_enum, default_value_t = Target::All)]
        target: Target,
    },
    /// Enumerate item ids per lister collection into envelope files.
    Items {
        #[arg(long = "account")]
        accounts: Vec<String>,
        /// Only enumerate the first N collections.
        #[arg(long)]
        limit: Option<usize>,
        /// Print one line per enumerated collection.
        #[arg(long)]
        verbose: bool,
    },
    /// Export one CSV per enumerated entity.
    Export(export::ExportArgs),
    /// Fetch and trim the per-item description pages.
    Fetch {
        #[arg(long = "account")]
        accounts: Vec<String>,
        /// Directory of cleaned JSON files to take item ids from.
        #[arg(long)]
        input_dir: Option<PathBuf>,
        /// Directory the HTML fragments are written to.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    Catalog,
    Lister,
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = abx_core::load_app_config()?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Login { accounts } => login::run(&config, &accounts).await,
        Commands::Discover { accounts, target } => discover::run(&config, &accounts, target).await,
        Commands::Items {
            accounts,
            limit,
            verbose,
        } => items::run(&config, &accounts, limit, verbose).await,
        Commands::Export(args) => export::run(&config, args).await,
        Commands::Fetch {
            accounts,
            input_dir,
            output_dir,
            workers,
        } => fetch::run(&config, &accounts, input_dir, output_dir, workers).await,
    }
}
