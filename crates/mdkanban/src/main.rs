//! CLI entry point for mdkanban.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use mdkanban_app::BoardSettings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use commands::TaskRef;

mod commands;

/// Kanban board over Markdown checklist tasks.
#[derive(Parser, Debug)]
#[command(
    name = "mdkanban",
    version,
    about = "mdkanban: a kanban board over `- [ ]` tasks in a Markdown vault"
)]
struct Cli {
    /// Vault directory (defaults to current).
    #[arg(long, default_value = ".")]
    vault: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default settings file.
    Init {
        /// Overwrite an existing settings file.
        #[arg(long)]
        force: bool,
    },

    /// Print the board.
    Board {
        #[arg(long, value_enum, default_value_t = BoardFormat::Text)]
        format: BoardFormat,
    },

    /// List items that could not be parsed.
    Check,

    /// Complete a task, given as `file:line`.
    Complete { task: TaskRef },

    /// Move a task into another column.
    Move {
        task: TaskRef,
        /// Target column tag, with or without `#`.
        #[arg(long)]
        status: String,
        /// Land in front of this task instead of at the end.
        #[arg(long)]
        before: Option<TaskRef>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BoardFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let Cli { vault, cmd } = Cli::parse();
    let settings = BoardSettings::load(&vault)?;
    install_tracing(settings.log_level);

    tokio::runtime::Runtime::new()?.block_on(commands::run(vault, settings, cmd))
}

fn install_tracing(level: tracing::Level) {
    // RUST_LOG wins; the settings' logLevel is the default.
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
