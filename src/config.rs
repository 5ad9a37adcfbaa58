use crate::errors::{AppError, AppResult, ErrorContextExt};
use crate::shared::paths::DataLayout;
use std::fs;
use std::path::{Path, PathBuf};

// Re-export shared types for convenience
pub use crate::shared::config::{
    Config, DaemonConfig, NotifierKind, NtfyConfig, SourceSpec, TransportConfig, TransportKind,
};

/// Configuration manager for Social Notifier
///
/// Loads `config.toml` from the data directory, writing a default file the
/// first time. The loaded configuration is never mutated afterwards; callers
/// take an `Arc<Config>` snapshot via [`ConfigManager::into_config`].
///
/// # Example
///
/// ```rust,no_run
/// use social_notifier::config::ConfigManager;
/// use social_notifier::shared::paths::DataLayout;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let layout = DataLayout::resolve(None)?;
///     let manager = ConfigManager::load(&layout)?;
///     println!("Transport: {:?}", manager.config().transport.kind);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the configuration for the given data directory
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the
    /// configuration file cannot be read, parsed, or written.
    pub fn load(layout: &DataLayout) -> AppResult<Self> {
        layout.ensure()?;
        let config_path = layout.config_file();
        let config = Self::load_or_create(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }

    fn load_or_create(path: &Path) -> AppResult<Config> {
        if path.exists() {
            let content = fs::read_to_string(path).in_file_operation(path, "read config file")?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Config::default();
            let content = toml::to_string_pretty(&config).map_err(|e| {
                AppError::config_with_source("Failed to serialize default config", e)
            })?;
            fs::write(path, content).in_file_operation(path, "write default config")?;
            Ok(config)
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Returns an immutable reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }
}
