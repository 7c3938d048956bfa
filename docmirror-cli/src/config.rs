use docmirror::CloudConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub project_id: ConfigValue<String>,
    pub storage_bucket: ConfigValue<String>,
    /// Directory holding locator records and the listener status file
    pub data_dir: ConfigValue<PathBuf>,
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(skip)]
    pub auth_token: Option<String>,
    pub document_endpoint: String,
    pub storage_endpoint: String,
    pub poll_interval_ms: u64,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    project_id: Option<String>,
    storage_bucket: Option<String>,
    data_dir: Option<PathBuf>,
    api_key: Option<String>,
    auth_token: Option<String>,
    document_endpoint: Option<String>,
    storage_endpoint: Option<String>,
    poll_interval_ms: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let defaults = CloudConfig::default();

        let mut project_id = ConfigValue::new(String::new(), ConfigSource::Default);
        let mut storage_bucket = ConfigValue::new(String::new(), ConfigSource::Default);
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut config = Self {
            project_id: project_id.clone(),
            storage_bucket: storage_bucket.clone(),
            data_dir: data_dir.clone(),
            api_key: None,
            auth_token: None,
            document_endpoint: defaults.document_endpoint,
            storage_endpoint: defaults.storage_endpoint,
            poll_interval_ms: defaults.poll_interval_ms,
            config_file: None,
        };

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let file: ConfigFile =
                serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;

            if let Some(id) = file.project_id {
                project_id = ConfigValue::new(id, ConfigSource::File);
            }
            if let Some(bucket) = file.storage_bucket {
                storage_bucket = ConfigValue::new(bucket, ConfigSource::File);
            }
            if let Some(dir) = file.data_dir {
                // Relative to the config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            config.api_key = file.api_key;
            config.auth_token = file.auth_token;
            if let Some(endpoint) = file.document_endpoint {
                config.document_endpoint = endpoint;
            }
            if let Some(endpoint) = file.storage_endpoint {
                config.storage_endpoint = endpoint;
            }
            if let Some(interval) = file.poll_interval_ms {
                config.poll_interval_ms = interval;
            }
            config.config_file = Some(path);
        }

        if let Ok(id) = std::env::var("DOCMIRROR_PROJECT_ID") {
            project_id = ConfigValue::new(id, ConfigSource::Environment);
        }
        if let Ok(bucket) = std::env::var("DOCMIRROR_BUCKET") {
            storage_bucket = ConfigValue::new(bucket, ConfigSource::Environment);
        }
        if let Ok(dir) = std::env::var("DOCMIRROR_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(key) = std::env::var("DOCMIRROR_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("DOCMIRROR_TOKEN") {
            config.auth_token = Some(token);
        }

        config.project_id = project_id;
        config.storage_bucket = storage_bucket;
        config.data_dir = data_dir;
        Ok(config)
    }

    /// Library configuration for the REST backends.
    pub fn cloud(&self) -> Result<CloudConfig, ConfigError> {
        if self.project_id.value.is_empty() {
            return Err(ConfigError::Missing("project_id"));
        }
        Ok(CloudConfig {
            api_key: self.api_key.clone(),
            auth_token: self.auth_token.clone(),
            document_endpoint: self.document_endpoint.clone(),
            storage_endpoint: self.storage_endpoint.clone(),
            poll_interval_ms: self.poll_interval_ms,
            ..CloudConfig::new(self.project_id.value.clone())
                .with_bucket(self.storage_bucket.value.clone())
        })
    }

    /// Like [`cloud`](Self::cloud), but also requires a storage bucket.
    pub fn storage(&self) -> Result<CloudConfig, ConfigError> {
        if self.storage_bucket.value.is_empty() {
            return Err(ConfigError::Missing("storage_bucket"));
        }
        self.cloud()
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.value.join("assets")
    }

    pub fn status_path(&self) -> PathBuf {
        self.data_dir.value.join("listeners.json")
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/docmirror/
    /// - macOS: ~/Library/Application Support/docmirror/
    /// - Windows: %APPDATA%/docmirror/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docmirror")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/docmirror/
    /// - macOS: ~/Library/Application Support/docmirror/
    /// - Windows: %APPDATA%/docmirror/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docmirror")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("'{0}' is not configured (set it in the config file or the environment)")]
    Missing(&'static str),
}
