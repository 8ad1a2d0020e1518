use std::{path::PathBuf, time::Instant};

use clap::Parser;
use miette::{IntoDiagnostic, Result};

pub use crate::{
    config::{Config, Icons, Notion, Overrides, Registry},
    state::RunType,
    sync::{sync, Error, Report},
};

mod app_config;
mod config;
mod fs;
mod manifest;
mod notion;
mod prompt;
mod registry;
mod release_notes;
mod state;
mod sync;
mod xml;

/// Publish the release notes of every .csproj under a directory to a Notion page, one child page
/// per package and one note per version.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Directory that is searched recursively for manifests [default: src]
    #[arg(long, env = "RELNOTE_SYNC_SOURCE_DIR")]
    source_dir: Option<PathBuf>,
    /// Extension of the manifest files to read [default: csproj]
    #[arg(long)]
    extension: Option<String>,
    /// URL or id of the Notion page whose child pages are regenerated
    #[arg(long, env = "RELNOTE_SYNC_ROOT_PAGE")]
    root_page: Option<String>,
    /// Base URL of the NuGet feed that publish dates are read from
    #[arg(long, env = "RELNOTE_SYNC_REGISTRY_URL")]
    registry_url: Option<String>,
    /// Notion integration secret. Read from the user config directory, or prompted for, if unset.
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Config file to use instead of ./relnote-sync.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print what would change without contacting Notion or the registry
    #[arg(long)]
    dry_run: bool,
    /// Delete existing child pages without asking first
    #[arg(long, short)]
    yes: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            source_dir: self.source_dir.clone(),
            extension: self.extension.clone(),
            root_page: self.root_page.clone(),
            registry_url: self.registry_url.clone(),
        }
    }
}

/// The entry point of the binary: parse arguments, load config and run a full sync.
///
/// ## Errors
/// Any fatal problem during the run, as a displayable [`miette::Report`].
pub fn run() -> Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.overrides())?;

    let dry_run = cli.dry_run;
    let run_type = if dry_run {
        RunType::DryRun
    } else if let Some(token) = cli.token {
        RunType::Real(token)
    } else {
        RunType::Real(app_config::get_or_prompt_for_notion_token()?)
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    let report = runtime.block_on(sync(&config, run_type, cli.yes))?;

    if !dry_run {
        println!("{report}");
    }
    println!("\nDONE");
    println!("Finished in {:0.4} seconds", started.elapsed().as_secs_f64());
    Ok(())
}
