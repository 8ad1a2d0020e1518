use std::collections::BTreeMap;

use log::{debug, trace};
use miette::Diagnostic;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::release_notes::Release;

/// The Notion API version every request is pinned to.
const API_VERSION: &str = "2022-06-28";
/// The longest `content` Notion accepts in one rich text object, in UTF-16 code units.
const MAX_TEXT_LENGTH: usize = 2000;

/// A page as returned by the Notion API, reduced to what's needed to address and report it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Page {
    pub(crate) id: String,
    pub(crate) title: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Block {
    pub(crate) id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    child_page: Option<ChildPage>,
}

impl Block {
    pub(crate) fn is_page(&self) -> bool {
        self.kind == "child_page"
    }

    pub(crate) fn title(&self) -> &str {
        self.child_page
            .as_ref()
            .map_or(self.id.as_str(), |page| page.title.as_str())
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ChildPage {
    title: String,
}

#[derive(Deserialize)]
struct PageResponse {
    id: String,
    #[serde(default)]
    properties: BTreeMap<String, Property>,
}

#[derive(Deserialize)]
struct Property {
    /// Only set on the property of type `title`
    title: Option<Vec<RichText>>,
}

#[derive(Deserialize)]
struct RichText {
    plain_text: String,
}

#[derive(Deserialize)]
struct BlockList {
    results: Vec<Block>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct CreatedPage {
    id: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Serialize)]
struct ListQuery<'a> {
    page_size: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<&'a str>,
}

/// An authenticated connection to the Notion REST API.
#[derive(Clone, Debug)]
pub(crate) struct Notion {
    client: Client,
    api_url: String,
    token: String,
}

impl Notion {
    pub(crate) fn new(client: Client, api_url: &str, token: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Fetch the page with `id` along with its title.
    pub(crate) async fn page(&self, id: &str) -> Result<Page, Error> {
        let url = format!("{}/pages/{id}", self.api_url);
        let response: PageResponse = self
            .send(self.client.get(url), "retrieving the root page")
            .await?;
        let title = response
            .properties
            .into_values()
            .find_map(|property| property.title)
            .map(|title| title.into_iter().map(|text| text.plain_text).collect())
            .unwrap_or_default();
        Ok(Page {
            id: response.id,
            title,
        })
    }

    /// Every direct child block of `id`, across as many result pages as the API returns.
    pub(crate) async fn children(&self, id: &str) -> Result<Vec<Block>, Error> {
        let url = format!("{}/blocks/{id}/children", self.api_url);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let query = ListQuery {
                page_size: 100,
                start_cursor: cursor.as_deref(),
            };
            let list: BlockList = self
                .send(self.client.get(&url).query(&query), "listing child blocks")
                .await?;
            blocks.extend(list.results);
            match list.next_cursor {
                Some(next) if list.has_more => cursor = Some(next),
                _ => break,
            }
        }
        trace!("Found {} child blocks under {id}", blocks.len());
        Ok(blocks)
    }

    /// Delete a block. Notion moves it to the trash; it is no longer a child of its parent.
    pub(crate) async fn delete(&self, id: &str) -> Result<(), Error> {
        let url = format!("{}/blocks/{id}", self.api_url);
        self.send::<Value>(self.client.delete(url), "deleting a page")
            .await
            .map(|_| ())
    }

    /// Create a child page of `parent` and return its id.
    pub(crate) async fn create_page(
        &self,
        parent: &str,
        title: &str,
        icon: &str,
    ) -> Result<String, Error> {
        let url = format!("{}/pages", self.api_url);
        let body = json!({
            "parent": { "page_id": parent },
            "icon": { "type": "emoji", "emoji": icon },
            "properties": {
                "title": { "title": [{ "type": "text", "text": { "content": title } }] }
            }
        });
        let created: CreatedPage = self
            .send(self.client.post(url).json(&body), "creating a page")
            .await?;
        debug!("Created page {title} with id {}", created.id);
        Ok(created.id)
    }

    /// Append a callout describing `release` to the end of page `page`.
    pub(crate) async fn append_callout(
        &self,
        page: &str,
        release: &Release,
        icon: &str,
    ) -> Result<(), Error> {
        let url = format!("{}/blocks/{page}/children", self.api_url);
        let body = json!({ "children": [callout(release, icon)] });
        self.send::<Value>(self.client.patch(url).json(&body), "adding a release note")
            .await
            .map(|_| ())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        activity: &'static str,
    ) -> Result<T, Error> {
        let response = request
            .bearer_auth(&self.token)
            .header("Notion-Version", API_VERSION)
            .send()
            .await
            .map_err(|source| Error::ApiRequest {
                activity,
                source: Box::new(source),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|error| error.message)
                .unwrap_or(body);
            return Err(Error::ApiStatus {
                activity,
                status: status.as_u16(),
                message,
            });
        }
        response.json().await.map_err(|source| Error::ApiResponse {
            activity,
            source: Box::new(source),
        })
    }
}

/// A callout block: the version in bold, then the rest of the release's text, with `icon`.
fn callout(release: &Release, icon: &str) -> Value {
    let body = release.body();
    let mut rich_text = vec![json!({
        "type": "text",
        "text": { "content": release.version },
        "annotations": { "bold": true }
    })];
    rich_text.extend(
        text_runs(&body)
            .into_iter()
            .map(|run| json!({ "type": "text", "text": { "content": run } })),
    );
    json!({
        "object": "block",
        "type": "callout",
        "callout": {
            "rich_text": rich_text,
            "icon": { "type": "emoji", "emoji": icon }
        }
    })
}

/// Split `text` on char boundaries into runs no longer than [`MAX_TEXT_LENGTH`].
fn text_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut length = 0;
    for (index, c) in text.char_indices() {
        if length + c.len_utf16() > MAX_TEXT_LENGTH {
            runs.push(&text[start..index]);
            start = index;
            length = 0;
        }
        length += c.len_utf16();
    }
    if start < text.len() {
        runs.push(&text[start..]);
    }
    runs
}

/// Turn a Notion page URL (or bare id, with or without dashes) into a dashed page id.
///
/// Notion URLs end in the page's 32 hex digit id, usually prefixed by a slug of its title.
pub(crate) fn page_id(reference: &str) -> Result<String, Error> {
    let without_query = reference
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let digits: Vec<char> = segment.chars().filter(|c| *c != '-').collect();
    let Some(tail) = digits.len().checked_sub(32).map(|start| &digits[start..]) else {
        return Err(Error::InvalidPage(reference.to_string()));
    };
    if !tail.iter().all(char::is_ascii_hexdigit) {
        return Err(Error::InvalidPage(reference.to_string()));
    }
    let hex: String = tail.iter().collect::<String>().to_lowercase();
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    ))
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum Error {
    #[error("{0} is not a Notion page URL or id")]
    #[diagnostic(
        code(notion::invalid_page),
        help("Copy the link to the root page from Notion; it ends in a 32 character id.")
    )]
    InvalidPage(String),
    #[error("Trouble communicating with Notion while {activity}: {source}")]
    #[diagnostic(
        code(notion::api_request),
        help("There was a problem reaching the Notion API, this is probably a network issue.")
    )]
    ApiRequest {
        activity: &'static str,
        #[source]
        source: Box<reqwest::Error>,
    },
    #[error("Notion responded with {status} while {activity}: {message}")]
    #[diagnostic(
        code(notion::api_status),
        help("Check that the token is valid and the root page is shared with the integration.")
    )]
    ApiStatus {
        activity: &'static str,
        status: u16,
        message: String,
    },
    #[error("Trouble decoding the response from Notion while {activity}: {source}")]
    #[diagnostic(code(notion::api_response))]
    ApiResponse {
        activity: &'static str,
        #[source]
        source: Box<reqwest::Error>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        "https://www.notion.so/xlentlink/Release-notes-Nexus-Link-Libraries-7779ee0765a649e78ad94878c7f859a0"
    )]
    #[case("https://www.notion.so/7779ee0765a649e78ad94878c7f859a0?v=123&p=abc")]
    #[case("https://www.notion.so/team/Release-notes-7779EE0765A649E78AD94878C7F859A0/")]
    #[case("7779ee0765a649e78ad94878c7f859a0")]
    #[case("7779ee07-65a6-49e7-8ad9-4878c7f859a0")]
    fn page_ids(#[case] reference: &str) {
        assert_eq!(
            page_id(reference).unwrap(),
            "7779ee07-65a6-49e7-8ad9-4878c7f859a0"
        );
    }

    #[rstest]
    #[case("https://www.notion.so/Release-notes")]
    #[case("")]
    #[case("Release-notes-zzzzee0765a649e78ad94878c7f859a0")]
    fn invalid_page_ids(#[case] reference: &str) {
        assert!(matches!(page_id(reference), Err(Error::InvalidPage(_))));
    }

    #[test]
    fn callout_body() {
        let mut release = Release::new("1.0.0", "Fixed a crash.");
        release.date = Some("2020-03-17".to_string());

        assert_eq!(
            callout(&release, "🐞"),
            json!({
                "object": "block",
                "type": "callout",
                "callout": {
                    "rich_text": [
                        {
                            "type": "text",
                            "text": { "content": "1.0.0" },
                            "annotations": { "bold": true }
                        },
                        {
                            "type": "text",
                            "text": { "content": " (2020-03-17)\nFixed a crash." }
                        }
                    ],
                    "icon": { "type": "emoji", "emoji": "🐞" }
                }
            })
        );
    }

    #[test]
    fn long_body_is_split_into_runs() {
        let release = Release::new("1.0.0", &"Improved logging. ✨ ".repeat(150));

        let body = callout(&release, "🔸");

        let runs: Vec<&str> = body["callout"]["rich_text"]
            .as_array()
            .unwrap()
            .iter()
            .skip(1)
            .map(|run| run["text"]["content"].as_str().unwrap())
            .collect();
        assert!(runs.len() > 1);
        assert!(runs
            .iter()
            .all(|run| run.encode_utf16().count() <= MAX_TEXT_LENGTH));
        assert_eq!(runs.concat(), release.body());
    }

    #[test]
    fn short_body_is_one_run() {
        assert_eq!(text_runs("\nFixed a crash."), vec!["\nFixed a crash."]);
        assert_eq!(text_runs(""), Vec::<&str>::new());
    }

    #[test]
    fn block_titles() {
        let blocks: Vec<Block> = serde_json::from_value(json!([
            { "id": "a", "type": "child_page", "child_page": { "title": "Nexus.Link.Libraries.Core" } },
            { "id": "b", "type": "paragraph", "paragraph": { "rich_text": [] } }
        ]))
        .unwrap();

        assert!(blocks[0].is_page());
        assert_eq!(blocks[0].title(), "Nexus.Link.Libraries.Core");
        assert!(!blocks[1].is_page());
        assert_eq!(blocks[1].title(), "b");
    }
}
