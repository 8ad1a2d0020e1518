use miette::Diagnostic;
use reqwest::{Client, Response};
use xmltree::Element;

use crate::xml;

/// The OData endpoint describing one version of one package.
pub(crate) fn package_url(base_url: &str, package: &str, version: &str) -> String {
    format!(
        "{}/Packages(Id='{package}',Version='{version}')",
        base_url.trim_end_matches('/')
    )
}

/// A NuGet feed which knows when each package version was published.
#[derive(Clone, Debug)]
pub(crate) struct Registry {
    client: Client,
    base_url: String,
}

impl Registry {
    pub(crate) fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    pub(crate) fn package_url(&self, package: &str, version: &str) -> String {
        package_url(&self.base_url, package, version)
    }

    /// The `YYYY-MM-DD` date that `version` of `package` was last updated in the feed.
    pub(crate) async fn published_date(
        &self,
        package: &str,
        version: &str,
    ) -> Result<String, Error> {
        let url = self.package_url(package, version);
        let body = self
            .client
            .get(&url)
            .header("Accept", "application/atom+xml, application/xml")
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|source| Error::Request {
                url: url.clone(),
                source: Box::new(source),
            })?
            .text()
            .await
            .map_err(|source| Error::Request {
                url: url.clone(),
                source: Box::new(source),
            })?;
        parse_updated(&body).map_err(|err| err.at(url))
    }
}

/// The first ten characters of the first `updated` element in an Atom entry.
fn parse_updated(body: &str) -> Result<String, ParseError> {
    let entry = Element::parse(body.as_bytes()).map_err(ParseError::Xml)?;
    let found = xml::find_all(&entry, "updated");
    let updated = found
        .first()
        .and_then(|element| element.get_text())
        .filter(|text| !text.trim().is_empty())
        .ok_or(ParseError::MissingUpdated)?;
    Ok(updated.trim().chars().take(10).collect())
}

#[derive(Debug)]
enum ParseError {
    Xml(xmltree::ParseError),
    MissingUpdated,
}

impl ParseError {
    fn at(self, url: String) -> Error {
        match self {
            Self::Xml(source) => Error::Xml { url, source },
            Self::MissingUpdated => Error::MissingUpdated { url },
        }
    }
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum Error {
    #[error("Problem fetching {url}: {source}")]
    #[diagnostic(
        code(registry::request),
        help("The package registry may be unreachable, or this version was never published to it.")
    )]
    Request {
        url: String,
        #[source]
        source: Box<reqwest::Error>,
    },
    #[error("The registry returned invalid XML for {url}: {source}")]
    #[diagnostic(code(registry::xml))]
    Xml {
        url: String,
        #[source]
        source: xmltree::ParseError,
    },
    #[error("The registry entry at {url} has no `updated` date")]
    #[diagnostic(code(registry::missing_updated))]
    MissingUpdated { url: String },
}
