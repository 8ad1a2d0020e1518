//! Secrets that live in the user's config directory rather than in the project.

use std::path::PathBuf;

use log::debug;
use miette::Diagnostic;

use crate::{fs, prompt};

const APP_NAME: &str = "relnote-sync";

pub(crate) fn get_or_prompt_for_notion_token() -> Result<String, Error> {
    load_value_or_prompt(
        "notion_token",
        "No Notion token found, create an internal integration at https://www.notion.so/my-integrations, share the root page with it and input its secret here",
    )
}

fn load_value_or_prompt(key: &str, message: &str) -> Result<String, Error> {
    let path = config_dir()?.join(key);
    if let Ok(value) = fs::read_to_string(&path) {
        let value = value.trim();
        if !value.is_empty() {
            debug!("Using {key} from {}", path.display());
            return Ok(value.to_string());
        }
    }
    let value = prompt::get_secret(message)?;
    fs::write(&path, &value)?;
    Ok(value)
}

fn config_dir() -> Result<PathBuf, Error> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or(Error::ConfigLocation)
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum Error {
    #[error("Could not determine a config directory for storing the Notion token")]
    #[diagnostic(
        code(app_config::config_location),
        help("Set the NOTION_TOKEN environment variable or pass --token instead.")
    )]
    ConfigLocation,
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fs(#[from] fs::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Prompt(#[from] prompt::Error),
}
