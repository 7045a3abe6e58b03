use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use covtree::cli::{self, Style};
use covtree::db::SqliteStore;
use covtree::notify::LogNotifier;

/// covtree: Cobertura coverage hierarchy, risk and trend analysis.
#[derive(Parser)]
#[command(name = "covtree", version, about)]
struct Cli {
    /// Path to the SQLite history database.
    #[arg(long, global = true, env = "COVTREE_DB", default_value = ".covtree.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show overall and per-package coverage.
    Summary {
        /// Path to a Cobertura XML file.
        file: PathBuf,
    },

    /// Show the package / folder / class hierarchy.
    Tree {
        file: PathBuf,

        /// Deepest level to show (default: the whole tree, up to 10).
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Rank classes by risk.
    Risks {
        file: PathBuf,

        /// Also rank packages.
        #[arg(long)]
        packages: bool,
    },

    /// Summarize strengths and weaknesses of a coverage report.
    Insights { file: PathBuf },

    /// Compare two coverage reports (older first).
    Compare {
        old: PathBuf,
        new: PathBuf,

        #[arg(long, value_enum, default_value_t = Style::Text)]
        style: Style,
    },

    /// Save a report to the history database.
    Save {
        file: PathBuf,

        /// Name for this report (default: file name).
        #[arg(long)]
        name: Option<String>,
    },

    /// List saved reports, newest first.
    History,

    /// Show recorded coverage snapshots and the latest trend.
    Trend,
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).context("Failed to open database")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let notifier = LogNotifier;

    let output = match cli.command {
        Commands::Summary { file } => cli::cmd_summary(&file, &notifier),
        Commands::Tree { file, depth } => cli::cmd_tree(&file, depth, &notifier),
        Commands::Risks { file, packages } => cli::cmd_risks(&file, packages, &notifier),
        Commands::Insights { file } => cli::cmd_insights(&file, &notifier),
        Commands::Compare { old, new, style } => cli::cmd_compare(&old, &new, style, &notifier),
        Commands::Save { file, name } => {
            let mut store = open_store(&cli.db)?;
            cli::cmd_save(&mut store, &file, name.as_deref(), &notifier)
        }
        Commands::History => cli::cmd_history(&mut open_store(&cli.db)?),
        Commands::Trend => cli::cmd_trend(&mut open_store(&cli.db)?),
    }?;

    print!("{output}");
    Ok(())
}
