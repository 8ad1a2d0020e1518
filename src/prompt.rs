use inquire::{Confirm, InquireError, Password};
use miette::Diagnostic;

/// Ask for a secret without echoing it back.
pub(crate) fn get_secret(prompt: &str) -> Result<String, Error> {
    Password::new(prompt)
        .with_display_toggle_enabled()
        .without_confirmation()
        .prompt()
        .map_err(Error)
}

/// Ask a yes/no question which defaults to "no".
pub(crate) fn confirm(prompt: &str) -> Result<bool, Error> {
    Confirm::new(prompt)
        .with_default(false)
        .prompt()
        .map_err(Error)
}

#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("Failed to get user input")]
#[diagnostic(
    code(prompt),
    help("This needs user input, but none could be read. Pass --yes and --token (or NOTION_TOKEN) to run without a terminal."),
)]
pub struct Error(#[from] InquireError);
