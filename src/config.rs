use std::{
    io,
    path::{Path, PathBuf},
};

use log::debug;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Deserialize;
use thiserror::Error;

use crate::fs;

/// A valid config, assembled from `relnote-sync.toml` (if any) and command line overrides.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The directory which is searched recursively for manifests
    pub source_dir: PathBuf,
    /// The file extension (without a leading `.`) that identifies a manifest
    pub extension: String,
    pub notion: Notion,
    pub registry: Registry,
    pub icons: Icons,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notion {
    /// A Notion URL or id of the page that every package page is created under
    pub root_page: String,
    pub api_url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Registry {
    /// Base URL of a NuGet OData feed. Without it, no publish dates are looked up.
    pub url: Option<String>,
}

/// The emoji used for each kind of page or note.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Icons {
    pub notes: String,
    pub bug: String,
    pub default: String,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            notes: "📒".to_string(),
            bug: "🐞".to_string(),
            default: "🔸".to_string(),
        }
    }
}

/// Values from the command line (or environment) which take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub source_dir: Option<PathBuf>,
    pub extension: Option<String>,
    pub root_page: Option<String>,
    pub registry_url: Option<String>,
}

/// The raw contents of a config file, before defaults and overrides are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLoader {
    source_dir: Option<PathBuf>,
    extension: Option<String>,
    #[serde(default)]
    notion: NotionLoader,
    #[serde(default)]
    registry: Registry,
    #[serde(default)]
    icons: Icons,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotionLoader {
    root_page: Option<String>,
    api_url: Option<String>,
}

impl Config {
    pub const CONFIG_PATH: &'static str = "relnote-sync.toml";
    pub const DEFAULT_SOURCE_DIR: &'static str = "src";
    pub const DEFAULT_EXTENSION: &'static str = "csproj";
    pub const DEFAULT_NOTION_API: &'static str = "https://api.notion.com/v1";

    /// Load the config file at `path`, or `relnote-sync.toml` if it exists, then apply `overrides`.
    ///
    /// ## Errors
    /// 1. An explicitly requested config file can't be read
    /// 2. The config file is not valid TOML or has unknown keys
    /// 3. No root page is set anywhere
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, Error> {
        let loader = match path {
            Some(path) => Self::parse_file(path, fs::read_to_string(path)?)?,
            None => Self::load_optional(Path::new(Self::CONFIG_PATH))?,
        };
        Self::from_loader(loader, overrides)
    }

    /// Parse `path` if it exists. Any other problem reading it is an error.
    fn load_optional(path: &Path) -> Result<ConfigLoader, Error> {
        match fs::read_to_string(path) {
            Ok(source_code) => Self::parse_file(path, source_code),
            Err(fs::Error::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!("No `{}` found, using defaults", path.display());
                Ok(ConfigLoader::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn parse_file(path: &Path, source_code: String) -> Result<ConfigLoader, Error> {
        toml::from_str(&source_code).map_err(|err| Error::Toml {
            message: err.message().to_string(),
            span: err.span().map(SourceSpan::from),
            source_code: NamedSource::new(path.display().to_string(), source_code),
        })
    }

    fn from_loader(loader: ConfigLoader, overrides: Overrides) -> Result<Self, Error> {
        let root_page = overrides
            .root_page
            .or(loader.notion.root_page)
            .ok_or(Error::MissingRootPage)?;
        let extension = overrides
            .extension
            .or(loader.extension)
            .unwrap_or_else(|| Self::DEFAULT_EXTENSION.to_string());

        Ok(Self {
            source_dir: overrides
                .source_dir
                .or(loader.source_dir)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_SOURCE_DIR)),
            extension: extension.trim_start_matches('.').to_string(),
            notion: Notion {
                root_page,
                api_url: loader
                    .notion
                    .api_url
                    .unwrap_or_else(|| Self::DEFAULT_NOTION_API.to_string()),
            },
            registry: Registry {
                url: overrides.registry_url.or(loader.registry.url),
            },
            icons: loader.icons,
        })
    }
}

#[derive(Debug, Diagnostic, Error)]
pub enum Error {
    #[error("Invalid config file: {message}")]
    #[diagnostic(
        code(config::toml),
        help("Check the config file against the documented keys: source_dir, extension, [notion], [registry] and [icons]")
    )]
    Toml {
        message: String,
        #[label("{message}")]
        span: Option<SourceSpan>,
        #[source_code]
        source_code: NamedSource,
    },
    #[error("No Notion root page configured")]
    #[diagnostic(
        code(config::missing_root_page),
        help("Pass --root-page, set RELNOTE_SYNC_ROOT_PAGE, or add `root_page` to the [notion] table of relnote-sync.toml")
    )]
    MissingRootPage,
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fs(#[from] fs::Error),
}
