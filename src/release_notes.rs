use std::{fmt, fmt::Display, sync::OnceLock};

use regex::Regex;

use crate::config::Icons;

/// One version's entry from a release notes field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Release {
    pub(crate) version: String,
    pub(crate) description: String,
    /// When the version was published, as `YYYY-MM-DD`
    pub(crate) date: Option<String>,
}

impl Release {
    pub(crate) fn new(version: &str, description: &str) -> Self {
        Self {
            version: version.trim().to_string(),
            description: description.trim().to_string(),
            date: None,
        }
    }

    /// Whether the description reads like a defect fix.
    pub(crate) fn is_fix(&self) -> bool {
        let description = self.description.to_lowercase();
        description.contains("fix") || description.contains("bug")
    }

    pub(crate) fn icon<'icons>(&self, icons: &'icons Icons) -> &'icons str {
        if self.is_fix() {
            &icons.bug
        } else {
            &icons.default
        }
    }

    /// Everything after the bold version: the date (if known), a line break, the description.
    pub(crate) fn body(&self) -> String {
        match &self.date {
            Some(date) => format!(" ({date})\n{}", self.description),
            None => format!("\n{}", self.description),
        }
    }
}

impl Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "**{}**{}", self.version, self.body())
    }
}

fn version_marker() -> &'static Regex {
    static VERSION_MARKER: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)] // constant pattern
    VERSION_MARKER.get_or_init(|| Regex::new(r"\d+\.\d+\.\d+").unwrap())
}

/// Split free-form release notes into one [`Release`] per version marker.
///
/// Splitting on the markers gives `[preamble, version, description, version, description, ...]`.
/// Each marker is paired with the text up to the next marker, so consecutive markers produce an
/// empty description. Text before the first marker is not part of any release.
pub(crate) fn split(notes: &str) -> Vec<Release> {
    let markers: Vec<_> = version_marker().find_iter(notes).collect();
    markers
        .iter()
        .enumerate()
        .map(|(index, marker)| {
            let end = markers
                .get(index + 1)
                .map_or(notes.len(), regex::Match::start);
            Release::new(marker.as_str(), &notes[marker.end()..end])
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn two_versions() {
        let releases = split("1.0.0 Fixed a crash. 1.0.1 Improved performance.");

        assert_eq!(
            releases,
            vec![
                Release::new("1.0.0", "Fixed a crash."),
                Release::new("1.0.1", "Improved performance."),
            ]
        );
    }

    #[test]
    fn preamble_is_ignored() {
        let releases = split(
            "Release notes for the core library\n\n2.1.0\nNew logging API\n2.0.0\nBreaking: dropped net461",
        );

        assert_eq!(
            releases,
            vec![
                Release::new("2.1.0", "New logging API"),
                Release::new("2.0.0", "Breaking: dropped net461"),
            ]
        );
    }

    #[test]
    fn preamble_starting_with_a_digit_is_not_a_version() {
        let releases = split("2 packages updated 1.0.0 Initial");

        assert_eq!(releases, vec![Release::new("1.0.0", "Initial")]);
    }

    #[test]
    fn consecutive_versions_keep_empty_description() {
        let releases = split("1.0.1 1.0.0 Initial release");

        assert_eq!(
            releases,
            vec![
                Release::new("1.0.1", ""),
                Release::new("1.0.0", "Initial release"),
            ]
        );
    }

    #[test]
    fn trailing_version() {
        let releases = split("1.0.0 Initial release 1.0.1");

        assert_eq!(
            releases,
            vec![
                Release::new("1.0.0", "Initial release"),
                Release::new("1.0.1", ""),
            ]
        );
    }

    #[test]
    fn no_versions() {
        assert!(split("Nothing to see here, version 2 coming soon").is_empty());
    }

    #[rstest]
    #[case("Fixed a crash.", true)]
    #[case("Found a nasty Bug in the parser", true)]
    #[case("PREFIX handling", true)]
    #[case("Improved performance.", false)]
    #[case("", false)]
    fn fix_detection(#[case] description: &str, #[case] is_fix: bool) {
        assert_eq!(Release::new("1.0.0", description).is_fix(), is_fix);
    }

    #[test]
    fn icon_follows_description() {
        let icons = Icons::default();

        assert_eq!(Release::new("1.0.0", "Bug in retries").icon(&icons), "🐞");
        assert_eq!(Release::new("1.0.0", "New feature").icon(&icons), "🔸");
    }

    #[test]
    fn display_with_date() {
        let mut release = Release::new("1.0.0", "Fixed a crash.");
        release.date = Some("2020-03-17".to_string());

        assert_eq!(release.to_string(), "**1.0.0** (2020-03-17)\nFixed a crash.");
    }

    #[test]
    fn display_without_date() {
        let release = Release::new("1.0.0", "Fixed a crash.");

        assert_eq!(release.to_string(), "**1.0.0**\nFixed a crash.");
    }
}
