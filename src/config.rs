//! Configuration Management
//!
//! Handles persistent configuration storage for kubeclient.
//! Precedence is CLI > environment > config file > defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const SERVER_ENV: &str = "KUBECLIENT_SERVER";
pub const TOKEN_ENV: &str = "KUBECLIENT_TOKEN";
pub const NAMESPACE_ENV: &str = "KUBECLIENT_NAMESPACE";

const DEFAULT_SERVER: &str = "https://localhost:8443";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// API server base URL
    #[serde(default)]
    pub server: Option<String>,
    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Default namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kubeclient").join("config.yaml"))
    }

    /// Load configuration from disk, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from `path`; missing or unparseable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unparseable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Override fields from environment variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(server) = non_empty(SERVER_ENV) {
            self.server = Some(server);
        }
        if let Some(token) = non_empty(TOKEN_ENV) {
            self.token = Some(token);
        }
        if let Some(namespace) = non_empty(NAMESPACE_ENV) {
            self.namespace = Some(namespace);
        }
    }

    /// Override fields from command line flags
    pub fn with_overrides(
        mut self,
        server: Option<String>,
        token: Option<String>,
        namespace: Option<String>,
    ) -> Self {
        if server.is_some() {
            self.server = server;
        }
        if token.is_some() {
            self.token = token;
        }
        if namespace.is_some() {
            self.namespace = namespace;
        }
        self
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Configuration(format!("Failed to create {:?}: {}", parent, e)))?;
        }

        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Configuration(format!("Failed to write {:?}: {}", path, e)))?;

        Ok(())
    }

    /// Validated server base URL without a trailing slash
    pub fn base_url(&self) -> Result<String> {
        let raw = self.effective_server();
        let url = Url::parse(&raw)
            .map_err(|e| Error::Configuration(format!("Invalid server URL '{}': {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Configuration(format!(
                "Unsupported scheme '{}' in server URL",
                url.scheme()
            )));
        }
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    pub fn effective_server(&self) -> String {
        self.server
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
    }

    pub fn effective_namespace(&self) -> String {
        self.namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("kubeclient/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Set default namespace and save
    pub fn set_namespace(&mut self, namespace: &str) -> Result<()> {
        self.namespace = Some(namespace.to_string());
        self.save()
    }
}
