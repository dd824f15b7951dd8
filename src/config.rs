//! Client configuration loaded from TOML.
//!
//! Location: `$XDG_CONFIG_HOME/lsp-semcache/config.toml` (platform config
//! directory elsewhere), or an explicit `--config` path. Every key is
//! optional; a missing default file means the built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::document::PositionEncoding;
use crate::lsp::{ClientOptions, ServerCapabilities};

const CONFIG_DIR: &str = "lsp-semcache";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// How to start the analysis server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `languageId` sent with didOpen
    pub language_id: String,
    /// Deadline applied to each command; none when absent
    pub request_timeout_ms: Option<u64>,
    /// Overrides the encoding negotiated with the server
    pub position_encoding: Option<PositionEncoding>,
    /// Overrides whether `semanticTokens/range` is used
    pub semantic_tokens_range: Option<bool>,
    pub server: ServerConfig,
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            language_id: "plaintext".to_string(),
            request_timeout_ms: None,
            position_encoding: None,
            semantic_tokens_range: None,
            server: ServerConfig::default(),
            log_filter: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicitly named file; it must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    /// Load the file at [`default_config_path`], or `None` if there is none.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path).map(Some),
            _ => Ok(None),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Session options from negotiated capabilities, with local overrides.
    pub fn client_options(&self, capabilities: ServerCapabilities) -> ClientOptions {
        let mut options = ClientOptions::from_capabilities(self.language_id.clone(), capabilities);
        if let Some(encoding) = self.position_encoding {
            options.position_encoding = encoding;
        }
        if let Some(range) = self.semantic_tokens_range {
            options.semantic_tokens_range = range;
        }
        options
    }
}

/// Per-user configuration file path, if a config directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ClientConfig::from_toml(Path::new("config.toml"), "").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.language_id, "plaintext");
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn parses_every_key() {
        let toml = r#"
            language_id = "go"
            request_timeout_ms = 2500
            position_encoding = "utf-16"
            semantic_tokens_range = false
            log_filter = "lsp_semcache=debug"

            [server]
            command = ["gopls", "serve"]
        "#;
        let config = ClientConfig::from_toml(Path::new("config.toml"), toml).unwrap();
        assert_eq!(config.language_id, "go");
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.position_encoding, Some(PositionEncoding::Utf16));
        assert_eq!(config.semantic_tokens_range, Some(false));
        assert_eq!(config.server.command, vec!["gopls", "serve"]);
        assert_eq!(config.log_filter.as_deref(), Some("lsp_semcache=debug"));
    }

    #[test]
    fn invalid_encoding_is_a_parse_error() {
        let err = ClientConfig::from_toml(Path::new("bad.toml"), r#"position_encoding = "utf-32""#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "language_id = \"rust\"").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.language_id, "rust");
    }

    #[test]
    fn load_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn overrides_apply_on_top_of_capabilities() {
        let capabilities = ServerCapabilities {
            semantic_tokens_range: true,
            position_encoding: PositionEncoding::Utf16,
            ..Default::default()
        };

        let defaults = ClientConfig::default().client_options(capabilities.clone());
        assert!(defaults.semantic_tokens_range);
        assert_eq!(defaults.position_encoding, PositionEncoding::Utf16);

        let config = ClientConfig {
            language_id: "go".to_string(),
            position_encoding: Some(PositionEncoding::Utf8),
            semantic_tokens_range: Some(false),
            ..Default::default()
        };
        let options = config.client_options(capabilities);
        assert_eq!(options.language_id, "go");
        assert!(!options.semantic_tokens_range);
        assert_eq!(options.position_encoding, PositionEncoding::Utf8);
    }
}
