//! Syndication feed source: `rss <url> [username password]`
//!
//! Accepts RSS 0.9x/1.0/2.0, Atom and JSON Feed documents; the format is
//! detected from the body.

use super::{FetchError, FetchResult, SourceAdapter, StatusItem};
use crate::errors::{AppError, AppResult};
use crate::shared::config::RssConfig;
use async_trait::async_trait;
use feed_rs::model::{Entry, Feed};
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const SOURCE_TYPE: &str = "rss";

const SUMMARY_LIMIT: usize = 150;

pub struct RssSource {
    client: Client,
    url: String,
    credentials: Option<(String, String)>,
    max_items: usize,
}

impl RssSource {
    pub fn new(config: &RssConfig, params: &[String]) -> AppResult<Self> {
        let mut params = params.iter();
        let url = params.next().cloned().unwrap_or_default();
        let credentials = match (params.next(), params.next()) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            (Some(_), None) => {
                return Err(AppError::invalid_parameters(
                    SOURCE_TYPE,
                    "Password is required when a username is given",
                ))
            }
            _ => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("social-notifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config_with_source("Failed to create HTTP client", e))?;

        let source = Self {
            client,
            url,
            credentials,
            max_items: config.max_items,
        };
        source.validate_parameters()?;
        Ok(source)
    }

    fn parse_document(&self, document: &[u8]) -> FetchResult {
        let feed = feed_rs::parser::parse(document).map_err(|e| FetchError::Parse(e.to_string()))?;
        Ok(self.parse_items(feed))
    }

    fn parse_items(&self, feed: Feed) -> Vec<StatusItem> {
        let feed_title = feed
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| self.url.clone());

        feed.entries
            .into_iter()
            .take(self.max_items)
            .filter_map(|entry| {
                let link = entry.links.first().map(|l| l.href.clone());
                let id = Some(entry.id.clone())
                    .filter(|id| !id.is_empty())
                    .or_else(|| link.clone())?;
                let payload = serde_json::json!({
                    "id": id,
                    "link": link,
                    "title": entry.title.as_ref().map(|t| t.content.clone()),
                });
                Some(StatusItem::new(id, feed_title.clone(), entry_body(&entry)).with_payload(payload))
            })
            .collect()
    }
}

fn entry_body(entry: &Entry) -> String {
    let mut body = Vec::new();
    if let Some(title) = &entry.title {
        body.push(title.content.trim().to_string());
    }
    if let Some(author) = entry.authors.first().filter(|a| !a.name.is_empty()) {
        body.push(format!("by {}", author.name));
    }
    let summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.as_str())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()));
    if let Some(summary) = summary {
        body.push(summary.trim().chars().take(SUMMARY_LIMIT).collect());
    }
    if let Some(date) = entry.updated.or(entry.published) {
        body.push(date.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string());
    }
    body.join("\n--\n")
}

#[async_trait]
impl SourceAdapter for RssSource {
    fn type_label(&self) -> &str {
        "RSS"
    }

    fn validate_parameters(&self) -> AppResult<()> {
        if self.url.is_empty() {
            return Err(AppError::invalid_parameters(SOURCE_TYPE, "URL is required"));
        }
        match Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(AppError::invalid_parameters(
                SOURCE_TYPE,
                "URL must be absolute",
            )),
        }
    }

    fn describe(&self) -> String {
        format!("RSS: {}", self.url)
    }

    async fn fetch_once(&mut self) -> FetchResult {
        let mut request = self.client.get(&self.url);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }

        let document = response.bytes().await?;
        self.parse_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_DOCUMENT: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <link>https://example.com/</link>
    <description>Posts</description>
    <item>
      <title>First</title>
      <guid>post-1</guid>
      <link>https://example.com/1</link>
      <description>Hello</description>
    </item>
    <item>
      <title>Second</title>
      <guid isPermaLink="true">https://example.com/2</guid>
    </item>
    <item>
      <title>Third</title>
      <link>https://example.com/3</link>
    </item>
    <item>
      <title>Fourth</title>
      <guid>post-4</guid>
    </item>
  </channel>
</rss>"#;

    const ATOM_DOCUMENT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Recent Commits to demo:main</title>
  <id>tag:github.com,2008:demo</id>
  <updated>2024-03-01T10:00:00Z</updated>
  <entry>
    <id>tag:github.com,2008:Grit::Commit/abc123</id>
    <title>Fix the build</title>
    <updated>2024-03-01T10:00:00Z</updated>
    <author><name>ann</name></author>
    <content type="html">Build was broken</content>
  </entry>
</feed>"#;

    fn source(params: &[&str]) -> AppResult<RssSource> {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        RssSource::new(&RssConfig::default(), &params)
    }

    #[test]
    fn test_requires_absolute_url() {
        assert!(source(&["https://example.com/feed.xml"]).is_ok());

        let err = source(&["feed.xml"]).err().unwrap();
        assert!(err.to_string().contains("URL must be absolute"));

        let err = source(&[]).err().unwrap();
        assert!(err.to_string().contains("URL is required"));
    }

    #[test]
    fn test_username_without_password() {
        let err = source(&["https://example.com/feed.xml", "me"]).err().unwrap();
        assert!(err.to_string().contains("Password is required"));
    }

    #[test]
    fn test_description() {
        let feed = source(&["https://example.com/feed.xml"]).unwrap();
        assert_eq!(feed.describe(), "RSS: https://example.com/feed.xml");
    }

    #[test]
    fn test_parse_rss_channel() {
        let feed = source(&["https://example.com/feed.xml"]).unwrap();
        let items = feed.parse_document(RSS_DOCUMENT.as_bytes()).unwrap();

        // max_items = 3
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "post-1");
        assert_eq!(items[0].title, "Example Blog");
        assert_eq!(items[0].body, "First\n--\nHello");
        assert_eq!(items[0].payload["link"], "https://example.com/1");
        assert_eq!(items[1].id, "https://example.com/2");
        assert_eq!(items[1].body, "Second");

        // No guid: still gets a stable, non-empty id
        assert!(!items[2].id.is_empty());
        let again = feed.parse_document(RSS_DOCUMENT.as_bytes()).unwrap();
        assert_eq!(again[2].id, items[2].id);
    }

    #[test]
    fn test_parse_atom_feed() {
        let feed = source(&["https://github.com/demo/commits/main.atom"]).unwrap();
        let items = feed.parse_document(ATOM_DOCUMENT.as_bytes()).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "tag:github.com,2008:Grit::Commit/abc123");
        assert_eq!(items[0].title, "Recent Commits to demo:main");
        assert!(items[0]
            .body
            .starts_with("Fix the build\n--\nby ann\n--\nBuild was broken\n--\n"));
    }

    #[test]
    fn test_parse_json_feed() {
        let feed = source(&["https://example.com/feed.json"]).unwrap();
        let document = serde_json::json!({
            "version": "https://jsonfeed.org/version/1.1",
            "title": "Json Blog",
            "items": [{"id": "j1", "title": "Hi", "content_text": "text"}]
        });
        let items = feed.parse_document(document.to_string().as_bytes()).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "j1");
        assert_eq!(items[0].title, "Json Blog");
    }

    #[test]
    fn test_unparseable_document() {
        let feed = source(&["https://example.com/feed.xml"]).unwrap();
        let result = feed.parse_document(b"<html>not a feed</html>");
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }
}
