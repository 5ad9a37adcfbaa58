//! ntfy (https://ntfy.sh) push notifications

use super::templates::TemplateEngine;
use super::{Notification, NotificationSink};
use crate::errors::{AppError, AppResult};
use crate::shared::config::{NtfyConfig, TemplateConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

/// Retry configuration for ntfy delivery
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Fraction of the delay randomized in either direction
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            ..Default::default()
        }
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = delay.min(self.max_delay_ms as f64);
        let jitter = delay * self.jitter_factor * (rand::random::<f64>() - 0.5);
        Duration::from_millis((delay + jitter).max(0.0) as u64)
    }
}

pub struct NtfySink {
    client: Client,
    endpoint: Url,
    config: NtfyConfig,
    retry: RetryConfig,
    templates: TemplateEngine,
}

impl NtfySink {
    pub fn new(config: &NtfyConfig, templates: &TemplateConfig) -> AppResult<Self> {
        let endpoint = Url::parse(&config.server_url).map_err(|e| {
            AppError::config_with_source(format!("Invalid ntfy server URL '{}'", config.server_url), e)
        })?;
        if config.topic.trim().is_empty() {
            return Err(AppError::config("ntfy topic must not be empty"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(concat!("social-notifier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            endpoint,
            config: config.clone(),
            retry: RetryConfig::exponential(config.max_retries, 500),
            templates: TemplateEngine::new(templates)?,
        })
    }

    fn build_headers(&self) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| AppError::config_with_source("Invalid ntfy auth token", e))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn build_json_body(&self, notification: &Notification) -> serde_json::Value {
        let (title, message) = self.templates.render(notification);
        let mut body = serde_json::json!({
            "topic": self.config.topic,
            "title": title,
            "message": message,
        });
        if let Some(priority) = self.config.priority {
            body["priority"] = serde_json::json!(priority);
        }
        if let Some(tags) = &self.config.tags {
            body["tags"] = serde_json::json!(tags);
        }
        body
    }

    async fn send_once(&self, body: &serde_json::Value) -> AppResult<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.build_headers()?)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::transport_with_source("ntfy request failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::transport(format!("ntfy returned {status}: {text}")));
        }
        Ok(())
    }

    async fn send_with_retry(&self, notification: &Notification) -> AppResult<()> {
        let body = self.build_json_body(notification);
        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry.max_attempts => {
                    debug!("ntfy attempt {} failed: {}", attempt + 1, e);
                    sleep(self.retry.calculate_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl NotificationSink for NtfySink {
    async fn notify(&self, notification: &Notification) {
        if let Err(e) = self.send_with_retry(notification).await {
            warn!("Failed to deliver notification to ntfy: {}", e);
        }
    }

    fn name(&self) -> &'static str {
        "ntfy"
    }
}
