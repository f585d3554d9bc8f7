//! dlkit CLI - concurrent, resumable HTTP downloads from the terminal

mod commands;
mod output;
mod platform;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// dlkit - concurrent, resumable downloads
#[derive(Parser)]
#[command(name = "dlkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory for dlkit settings
    #[arg(long, env = "DLKIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "human")]
    output: OutputFormat,

    /// Verbose output (engine debug logs on stderr)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one or more URLs
    Get(GetArgs),

    /// Show/update settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args)]
struct GetArgs {
    /// URLs to download
    #[arg(required = true)]
    urls: Vec<String>,

    /// Directory to save into (defaults to the configured download directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum concurrent downloads
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Retries per download after the first attempt
    #[arg(long)]
    retries: Option<u32>,

    /// Label for the download (single URL only)
    #[arg(long)]
    tag: Option<String>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value (nested keys use dots, e.g. notification.display_mode)
    Get {
        /// Config key
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key
        key: String,

        /// Config value
        value: String,
    },

    /// Show all config
    Show,

    /// Reset to defaults
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "warn,dlkit_core=debug"
        } else {
            "warn"
        })
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(dlkit_core::default_data_dir);
    let store = dlkit_core::SettingsStore::new(data_dir).await?;

    match cli.command {
        Commands::Get(args) => commands::get(&store, args, cli.output).await?,

        Commands::Config { action } => commands::config_action(&store, action, cli.output).await?,

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(shell, &mut Cli::command(), "dlkit", &mut std::io::stdout());
        }
    }

    Ok(())
}
