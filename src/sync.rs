use std::{collections::HashSet, fmt, fmt::Display, path::Path};

use log::{debug, warn};
use miette::Diagnostic;
use reqwest::Client;

use crate::{
    config::{Config, Icons},
    manifest,
    manifest::Manifest,
    notion,
    notion::{Notion, Page},
    prompt, registry,
    registry::Registry,
    release_notes,
    state::RunType,
};

/// What a run did, for the closing summary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Report {
    pub pages_removed: usize,
    pub pages_created: usize,
    pub notes_created: usize,
    pub notes_failed: usize,
    /// Notes created without a publish date
    pub undated: usize,
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Removed {} pages, created {} pages with {} notes ({} failed, {} without a date)",
            self.pages_removed,
            self.pages_created,
            self.notes_created,
            self.notes_failed,
            self.undated
        )
    }
}

/// Replace every child page of the configured root with one page per package found on disk.
///
/// A real run carries the Notion secret. Unless `assume_yes` is set, the user is asked before
/// anything is deleted.
///
/// ## Errors
/// Anything that makes the result unusable: a bad root page, Notion refusing to list or create
/// pages, an unreadable source directory, or declining the confirmation. Problems with a single
/// manifest, version, date or deletion are reported and skipped.
pub async fn sync(
    config: &Config,
    run_type: RunType<String>,
    assume_yes: bool,
) -> Result<Report, Error> {
    let root_id = notion::page_id(&config.notion.root_page)?;
    let mut report = Report::default();
    if config.registry.url.is_none() {
        warn!("No registry URL is configured, every version will be published without a date");
    }

    let session = match run_type {
        RunType::DryRun => {
            println!("Would remove every child page of Notion page {root_id}");
            None
        }
        RunType::Real(token) => {
            let client = Client::builder()
                .user_agent(concat!("relnote-sync/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(Error::Client)?;
            let notion = Notion::new(client.clone(), &config.notion.api_url, token);
            let root = notion.page(&root_id).await?;
            println!("We're at Notion page {}", root.title);
            report.pages_removed = clear(&notion, &root, assume_yes).await?;
            let registry = config
                .registry
                .url
                .as_deref()
                .map(|url| Registry::new(client, url));
            Some(Session {
                notion,
                registry,
                root,
            })
        }
    };

    let mut synchronized = HashSet::new();
    for path in manifest::discover(&config.source_dir, &config.extension)? {
        println!("Handling {}", path.display());
        let manifest = match Manifest::read(&path) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!("Skipping {}: {err}", path.display());
                continue;
            }
        };
        if !synchronized.insert(manifest.package_id.clone()) {
            warn!(
                "Skipping {}: package {} was already published from another manifest",
                path.display(),
                manifest.package_id
            );
            continue;
        }
        match &session {
            Some(session) => session.publish(&manifest, &config.icons, &mut report).await?,
            None => preview(&manifest, config, &path),
        }
    }
    Ok(report)
}

/// Delete every child page of `root`, returning how many were deleted.
async fn clear(notion: &Notion, root: &Page, assume_yes: bool) -> Result<usize, Error> {
    let pages: Vec<_> = notion
        .children(&root.id)
        .await?
        .into_iter()
        .filter(notion::Block::is_page)
        .collect();
    if pages.is_empty() {
        debug!("{} has no child pages to remove", root.title);
        return Ok(0);
    }
    if !assume_yes {
        let question = format!(
            "Delete all {} child pages of {} before recreating them?",
            pages.len(),
            root.title
        );
        if !prompt::confirm(&question)? {
            return Err(Error::Declined);
        }
    }

    let mut removed = 0;
    for page in pages {
        println!("Removing {}", page.title());
        match notion.delete(&page.id).await {
            Ok(()) => removed += 1,
            Err(err) => println!("ERROR {err}"),
        }
    }
    Ok(removed)
}

struct Session {
    notion: Notion,
    registry: Option<Registry>,
    root: Page,
}

impl Session {
    async fn publish(
        &self,
        manifest: &Manifest,
        icons: &Icons,
        report: &mut Report,
    ) -> Result<(), Error> {
        let package = &manifest.package_id;
        let page = self
            .notion
            .create_page(&self.root.id, package, &icons.notes)
            .await?;
        report.pages_created += 1;

        for mut release in release_notes::split(&manifest.release_notes) {
            if let Some(registry) = &self.registry {
                match registry.published_date(package, &release.version).await {
                    Ok(date) => release.date = Some(date),
                    Err(err) => {
                        debug!("{err}");
                        println!(
                            "Could not find DATE for {}. It's ok",
                            registry.package_url(package, &release.version)
                        );
                    }
                }
            }
            match self
                .notion
                .append_callout(&page, &release, release.icon(icons))
                .await
            {
                Ok(()) => {
                    report.notes_created += 1;
                    if release.date.is_none() {
                        report.undated += 1;
                    }
                }
                Err(err) => {
                    println!("ERROR {err}");
                    report.notes_failed += 1;
                }
            }
        }
        Ok(())
    }
}

/// Describe what a real run would publish for `manifest`, without any network I/O.
fn preview(manifest: &Manifest, config: &Config, path: &Path) {
    let icons = &config.icons;
    println!(
        "Would create page {} {} from {}",
        icons.notes,
        manifest.package_id,
        path.display()
    );
    for release in release_notes::split(&manifest.release_notes) {
        if let Some(url) = &config.registry.url {
            println!(
                "Would look up the publish date at {}",
                registry::package_url(url, &manifest.package_id, &release.version)
            );
        }
        println!("Would add note {} {release}", release.icon(icons));
    }
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum Error {
    #[error("Could not create an HTTP client: {0}")]
    #[diagnostic(code(sync::client))]
    Client(#[source] reqwest::Error),
    #[error("Child pages were not removed because the deletion was not confirmed")]
    #[diagnostic(
        code(sync::declined),
        help("Pass --dry-run to see what would change, or --yes to skip the confirmation.")
    )]
    Declined,
    #[error(transparent)]
    #[diagnostic(transparent)]
    Notion(#[from] notion::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] manifest::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Prompt(#[from] prompt::Error),
}
