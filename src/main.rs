use anyhow::Result;
use capumm::app::Overrides;
use capumm::config::Paths;
use capumm::{App, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "capumm")]
#[command(author, version, about = "A CLI mod manager for Capuchin (BepInEx plugins)")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Game directory override for this invocation
    #[arg(long)]
    game_dir: Option<PathBuf>,

    /// Read the manifest from a local file instead of the configured URL
    #[arg(long)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available mods grouped by category
    List {
        /// Only show one category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show the game directory and installed mods
    Status,

    /// Make the installed mods exactly the given selection
    Apply {
        /// Mod titles to keep or install; everything else is removed
        titles: Vec<String>,
        /// Re-download mods that are already installed
        #[arg(long)]
        reinstall: bool,
        /// Print the planned operations without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Install mods in addition to what is already installed
    Install {
        titles: Vec<String>,
        /// Re-download mods that are already installed
        #[arg(long)]
        reinstall: bool,
        /// Print the planned operations without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove installed mods
    Remove {
        titles: Vec<String>,
        /// Print the planned operations without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Open the game folder in the file manager
    Open,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set the game directory
    SetGameDir { path: String },
    /// Clear the game directory (auto-detect from Steam)
    ClearGameDir,
    /// Set the manifest URL
    SetManifestUrl { url: String },
}

fn setup_logging(verbosity: u8, log_file: Option<PathBuf>) {
    let filter = match verbosity {
        0 => "capumm=info",
        1 => "capumm=debug",
        2 => "capumm=trace",
        _ => "trace",
    };

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    match file {
        Some(file) => tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::sync::Arc::new(file)),
            )
            .init(),
        None => tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, Paths::new().ok().map(|p| p.log_file()));

    let config = Config::load().await?;
    let overrides = Overrides {
        game_dir: cli.game_dir,
        manifest: cli.manifest,
    };
    let mut app = App::new(config, overrides).await?;

    match cli.command {
        Commands::List { category } => app.cmd_list(category.as_deref()).await?,
        Commands::Status => app.cmd_status().await?,
        Commands::Apply {
            titles,
            reinstall,
            dry_run,
        } => app.cmd_apply(&titles, reinstall, dry_run).await?,
        Commands::Install {
            titles,
            reinstall,
            dry_run,
        } => app.cmd_install(&titles, reinstall, dry_run).await?,
        Commands::Remove { titles, dry_run } => app.cmd_remove(&titles, dry_run).await?,
        Commands::Open => app.cmd_open().await?,
        Commands::Config { action } => match action {
            ConfigCommands::Show => app.cmd_config_show().await?,
            ConfigCommands::SetGameDir { path } => app.cmd_config_set_game_dir(&path).await?,
            ConfigCommands::ClearGameDir => app.cmd_config_set_game_dir("").await?,
            ConfigCommands::SetManifestUrl { url } => {
                app.cmd_config_set_manifest_url(&url).await?
            }
        },
    }

    Ok(())
}
