use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for Social Notifier
///
/// Loaded once at startup and shared read-only (behind an `Arc`) by the
/// daemon controller, the transports and the source factories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub transport: TransportConfig,
    pub notifier: NotifierConfig,
    pub sources: SourcesConfig,
}

/// A source type plus the parameters handed to its adapter constructor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub source_type: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl SourceSpec {
    pub fn new(source_type: impl Into<String>, params: &[&str]) -> Self {
        Self {
            source_type: source_type.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Arguments of the equivalent `add` command
    pub fn to_add_params(&self) -> Vec<String> {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        params.push(self.source_type.clone());
        params.extend(self.params.iter().cloned());
        params
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub log_level: String,
    /// Pause after every slot and after every full pass of a polling worker
    pub poll_interval_ms: u64,
    /// Pause after a notification has been handed to the sink
    pub display_interval_ms: u64,
    /// Pause while the status queue is empty
    pub idle_interval_ms: u64,
    /// Display timeout passed to the sink with every notification
    pub notification_timeout_ms: u64,
    /// Delay between acknowledging `stop` and tearing the daemon down
    pub shutdown_grace_ms: u64,
    pub history_capacity: usize,
    pub startup_sources: Vec<SourceSpec>,
    pub default_source: SourceSpec,
}

impl DaemonConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            poll_interval_ms: 15_000,
            display_interval_ms: 2_000,
            idle_interval_ms: 2_000,
            notification_timeout_ms: 5_000,
            shutdown_grace_ms: 500,
            history_capacity: 100,
            startup_sources: Vec::new(),
            default_source: SourceSpec::new("twitter", &["home"]),
        }
    }
}

/// Which control transport the daemon serves and clients use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Socket,
    File,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Socket => "socket",
            Self::File => "file",
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "socket" | "tcp" => Ok(Self::Socket),
            "file" | "file-queue" => Ok(Self::File),
            other => Err(format!("unknown transport '{other}', expected 'socket' or 'file'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub host: String,
    pub port: u16,
    pub file_poll_interval_ms: u64,
    pub client_retry_ms: u64,
    pub response_timeout_ms: u64,
}

impl TransportConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Socket,
            host: "127.0.0.1".to_string(),
            port: 3456,
            file_poll_interval_ms: 100,
            client_retry_ms: 60,
            response_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    #[default]
    Desktop,
    Ntfy,
    Log,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub ntfy: NtfyConfig,
    pub templates: TemplateConfig,
}

/// Configuration for ntfy notification delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NtfyConfig {
    pub server_url: String,
    pub topic: String,
    pub auth_token: Option<String>,
    pub priority: Option<u8>,
    pub tags: Option<Vec<String>>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            server_url: "https://ntfy.sh".to_string(),
            topic: "social-notifier".to_string(),
            auth_token: None,
            priority: Some(3),
            tags: Some(vec!["social-notifier".to_string()]),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

/// Handlebars templates applied to a notification before it is sent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub title: String,
    pub body: String,
    pub variables: HashMap<String, String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            title: "{{title}}".to_string(),
            body: "{{body}}".to_string(),
            variables: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub twitter: TwitterConfig,
    #[serde(alias = "feed")]
    pub rss: RssConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub api_url: String,
    pub bearer_token: Option<String>,
    /// Account whose home timeline `twitter home` follows
    pub user_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.twitter.com/2".to_string(),
            bearer_token: None,
            user_id: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    pub max_items: usize,
    pub timeout_secs: u64,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            max_items: 3,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let daemon = DaemonConfig::default();
        assert_eq!(daemon.poll_interval(), Duration::from_secs(15));
        assert_eq!(daemon.display_interval(), Duration::from_secs(2));
        assert_eq!(daemon.idle_interval(), Duration::from_secs(2));
        assert_eq!(daemon.history_capacity, 100);
    }

    #[test]
    fn test_default_source_is_twitter_home() {
        let daemon = DaemonConfig::default();
        assert_eq!(
            daemon.default_source.to_add_params(),
            vec!["twitter".to_string(), "home".to_string()]
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [transport]
            kind = "file"

            [daemon]
            poll_interval_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.transport.kind, TransportKind::File);
        assert_eq!(config.transport.port, 3456);
        assert_eq!(config.daemon.poll_interval_ms, 50);
        assert_eq!(config.daemon.display_interval_ms, 2_000);
        assert_eq!(config.notifier.kind, NotifierKind::Desktop);
    }

    #[test]
    fn test_transport_kind_from_str() {
        assert_eq!("socket".parse::<TransportKind>().unwrap(), TransportKind::Socket);
        assert_eq!("FILE".parse::<TransportKind>().unwrap(), TransportKind::File);
        assert!("pigeon".parse::<TransportKind>().is_err());
    }
}
