//! Gateway configuration file.
//!
//! ```yaml
//! listen: 0.0.0.0:8080
//! backend:
//!   mode: remote
//!   endpoint: http://127.0.0.1:9090
//! default_timeout_ms: 5000
//! pretty: true
//! ```
//!
//! Every key is optional; command-line flags override the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Gateway settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub backend: BackendConfig,
    /// Deadline for calls that don't carry `rpc-timeout`
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,
    /// Indent JSON responses
    #[serde(default)]
    pub pretty: bool,
    /// Answer 400 to query parameters that name no field
    #[serde(default)]
    pub reject_unknown_query: bool,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
}

/// Where calls are served
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process, in-memory service
    #[default]
    Local,
    /// RPC server at `endpoint`
    Remote { endpoint: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            backend: BackendConfig::default(),
            default_timeout_ms: None,
            pretty: false,
            reject_unknown_query: false,
            metadata_prefix: default_metadata_prefix(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metadata_prefix() -> String {
    ferry_gateway::METADATA_HEADER_PREFIX.to_string()
}

impl Config {
    /// Load a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = write("{}\n");
        assert_eq!(Config::load(file.path()).unwrap(), Config::default());
        assert_eq!(Config::default().metadata_prefix, "rpc-metadata-");
    }

    #[test]
    fn test_remote_backend() {
        let file = write(
            "listen: 0.0.0.0:8080\n\
             backend:\n  mode: remote\n  endpoint: http://127.0.0.1:9090\n\
             default_timeout_ms: 1500\n\
             pretty: true\n",
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(
            config.backend,
            BackendConfig::Remote {
                endpoint: "http://127.0.0.1:9090".into()
            }
        );
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(1500)));
        assert!(config.pretty);
    }

    #[test]
    fn test_rejects_unknown_keys_and_modes() {
        assert!(Config::load(write("listen_on: x\n").path()).is_err());
        assert!(Config::load(write("backend:\n  mode: carrier-pigeon\n").path()).is_err());
        assert!(Config::load(Path::new("/nonexistent/ferry.yaml")).is_err());
    }
}
