//! Twitter timelines: `twitter home`, `twitter search <keyword>`, `twitter list <list-id>`

use super::{FetchError, FetchResult, SourceAdapter, StatusItem};
use crate::errors::{AppError, AppResult};
use crate::shared::config::TwitterConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const SOURCE_TYPE: &str = "twitter";

/// Number of tweets taken on the very first fetch
const INITIAL_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timeline {
    Home,
    List,
    Search,
}

impl Timeline {
    fn parse(method: &str) -> Option<Self> {
        match method {
            "home" => Some(Self::Home),
            "list" => Some(Self::List),
            "search" => Some(Self::Search),
            _ => None,
        }
    }
}

pub struct TwitterSource {
    client: Client,
    api_url: String,
    bearer_token: Option<String>,
    user_id: Option<String>,
    method: String,
    params: Vec<String>,
    since_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    name: String,
    username: String,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    newest_id: Option<String>,
}

impl TwitterSource {
    pub fn new(config: &TwitterConfig, params: &[String]) -> AppResult<Self> {
        let mut params = params.to_vec();
        let method = if params.is_empty() {
            String::new()
        } else {
            params.remove(0).to_ascii_lowercase()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("social-notifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config_with_source("Failed to create HTTP client", e))?;

        let source = Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            user_id: config.user_id.clone(),
            method,
            params,
            since_id: None,
        };
        source.validate_parameters()?;
        Ok(source)
    }

    fn timeline(&self) -> AppResult<Timeline> {
        if self.method.is_empty() {
            return Err(AppError::invalid_parameters(SOURCE_TYPE, "Request method is not set"));
        }
        Timeline::parse(&self.method).ok_or_else(|| {
            AppError::invalid_parameters(
                SOURCE_TYPE,
                format!("{} is not a valid request method", self.method),
            )
        })
    }

    fn endpoint(&self, timeline: Timeline) -> Result<(String, Vec<(&'static str, String)>), FetchError> {
        let mut query = vec![
            ("max_results", "10".to_string()),
            ("expansions", "author_id".to_string()),
            ("tweet.fields", "created_at".to_string()),
        ];
        if let Some(since_id) = &self.since_id {
            query.push(("since_id", since_id.clone()));
        }

        let url = match timeline {
            Timeline::Home => {
                let user_id = self.user_id.as_deref().ok_or_else(|| {
                    FetchError::NotConfigured("sources.twitter.user_id is required for home".into())
                })?;
                format!("{}/users/{}/timelines/reverse_chronological", self.api_url, user_id)
            }
            Timeline::List => format!("{}/lists/{}/tweets", self.api_url, self.params[0]),
            Timeline::Search => {
                query.push(("query", self.params.join(" ")));
                format!("{}/tweets/search/recent", self.api_url)
            }
        };
        Ok((url, query))
    }

    fn to_items(&self, response: TimelineResponse) -> Vec<StatusItem> {
        let users: HashMap<&str, &User> = response
            .includes
            .users
            .iter()
            .map(|u| (u.id.as_str(), u))
            .collect();

        let limit = if self.since_id.is_none() {
            INITIAL_COUNT
        } else {
            response.data.len()
        };

        response
            .data
            .iter()
            .take(limit)
            .map(|tweet| {
                let title = tweet
                    .author_id
                    .as_deref()
                    .and_then(|id| users.get(id))
                    .map(|u| format!("{} (@{})", u.name, u.username))
                    .unwrap_or_else(|| "Twitter".to_string());
                StatusItem::new(format!("twitter:{}", tweet.id), title, tweet.text.clone())
                    .with_payload(serde_json::to_value(tweet).unwrap_or_default())
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for TwitterSource {
    fn type_label(&self) -> &str {
        "Twitter"
    }

    fn validate_parameters(&self) -> AppResult<()> {
        match self.timeline()? {
            Timeline::Search if self.params.first().map_or(true, |k| k.is_empty()) => Err(
                AppError::invalid_parameters(SOURCE_TYPE, "Search keyword is not set"),
            ),
            Timeline::List if self.params.first().map_or(true, |l| l.is_empty()) => {
                Err(AppError::invalid_parameters(SOURCE_TYPE, "No list selected"))
            }
            _ => Ok(()),
        }
    }

    fn describe(&self) -> String {
        if self.params.is_empty() {
            format!("Twitter: {}", self.method)
        } else {
            format!("Twitter: {}: {}", self.method, self.params.join(" "))
        }
    }

    async fn fetch_once(&mut self) -> FetchResult {
        let token = self.bearer_token.clone().ok_or_else(|| {
            FetchError::NotConfigured("sources.twitter.bearer_token is not set".into())
        })?;
        let timeline = self
            .timeline()
            .map_err(|e| FetchError::NotConfigured(e.to_string()))?;
        let (url, query) = self.endpoint(timeline)?;

        debug!("Fetching {} ({})", url, self.describe());
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }

        let body: TimelineResponse = response.json().await?;
        let newest = body
            .meta
            .newest_id
            .clone()
            .or_else(|| body.data.first().map(|t| t.id.clone()));

        let items = self.to_items(body);
        if newest.is_some() {
            self.since_id = newest;
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_home_is_valid() {
        let source = TwitterSource::new(&TwitterConfig::default(), &params(&["home"])).unwrap();
        assert_eq!(source.describe(), "Twitter: home");
    }

    #[test]
    fn test_search_description() {
        let source =
            TwitterSource::new(&TwitterConfig::default(), &params(&["search", "foo"])).unwrap();
        assert_eq!(source.describe(), "Twitter: search: foo");
    }

    #[test]
    fn test_method_is_case_insensitive() {
        assert!(TwitterSource::new(&TwitterConfig::default(), &params(&["HOME"])).is_ok());
    }

    #[test]
    fn test_missing_method() {
        let err = TwitterSource::new(&TwitterConfig::default(), &[]).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Invalid parameters for 'twitter': Request method is not set"
        );
    }

    #[test]
    fn test_unknown_method() {
        let err = TwitterSource::new(&TwitterConfig::default(), &params(&["dms"]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("dms is not a valid request method"));
    }

    #[test]
    fn test_search_requires_keyword() {
        let err = TwitterSource::new(&TwitterConfig::default(), &params(&["search"]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Search keyword is not set"));
    }

    #[test]
    fn test_list_requires_id() {
        let err = TwitterSource::new(&TwitterConfig::default(), &params(&["list"]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("No list selected"));
    }

    #[tokio::test]
    async fn test_fetch_without_token_fails() {
        let mut source =
            TwitterSource::new(&TwitterConfig::default(), &params(&["home"])).unwrap();
        let result = source.fetch_once().await;
        assert!(matches!(result, Err(FetchError::NotConfigured(_))));
    }

    #[test]
    fn test_first_fetch_is_limited() {
        let source =
            TwitterSource::new(&TwitterConfig::default(), &params(&["search", "rust"])).unwrap();
        let response: TimelineResponse = serde_json::from_value(serde_json::json!({
            "data": [
                {"id": "5", "text": "five", "author_id": "1"},
                {"id": "4", "text": "four", "author_id": "1"},
                {"id": "3", "text": "three", "author_id": "1"},
                {"id": "2", "text": "two", "author_id": "1"}
            ],
            "includes": {"users": [{"id": "1", "name": "Ferris", "username": "ferris"}]},
            "meta": {"newest_id": "5"}
        }))
        .unwrap();

        let items = source.to_items(response);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "twitter:5");
        assert_eq!(items[0].title, "Ferris (@ferris)");
        assert_eq!(items[2].body, "three");
    }
}
