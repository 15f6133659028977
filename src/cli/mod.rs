use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::identity::SessionIdentity;
use crate::storage::{self, NoteAdapter};

pub mod commands;

use self::commands::{CheckUrlArgs, CommandContext, DeleteArgs, EditArgs, ListArgs, NewArgs};

#[derive(Parser, Debug)]
#[command(
    name = "ytnotes",
    version,
    about = "Notes for YouTube videos with debounced autosave"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over YTNOTES_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over YTNOTES_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Act as this user instead of identity.user_id from the config
    #[arg(long)]
    pub user: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report whether a URL is a YouTube video page
    CheckUrl(CheckUrlArgs),
    /// List your notes, optionally filtered by title
    List(ListArgs),
    /// Create a note as if written while watching URL
    New(NewArgs),
    /// Change the title or body of an existing note
    Edit(EditArgs),
    /// Delete a note
    Delete(DeleteArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let store = storage::init(&paths, &config.storage)?;

    let identity = match cli.user.as_deref().or(config.identity.user_id.as_deref()) {
        Some(user) => SessionIdentity::signed_in(user),
        None => SessionIdentity::signed_out(),
    };
    let ctx = CommandContext {
        adapter: NoteAdapter::new(Arc::new(store), Arc::new(identity)),
        config: Arc::new(config),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let output = runtime.block_on(async move {
        match cli.command {
            Commands::CheckUrl(args) => Ok(commands::check_url(&args).await),
            Commands::List(args) => commands::list_notes(&ctx, &args).await,
            Commands::New(args) => commands::new_note(&ctx, args).await,
            Commands::Edit(args) => commands::edit_note(&ctx, args).await,
            Commands::Delete(args) => commands::delete_note(&ctx, &args).await,
        }
    })?;
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
