//! Client config load/save for `~/.rag-ui/config.yaml`, plus base URL and
//! data directory resolution.

use std::path::{Path, PathBuf};

use crate::client::DEFAULT_BASE_URL;
use crate::messages::DEFAULT_TOP_K;
use crate::upload::DEFAULT_SLOW_UPLOAD_THRESHOLD;

/// Runtime override for the backend base URL; also read at build time.
pub const BASE_URL_ENV: &str = "RAG_UI_API_BASE_URL";
/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "RAG_UI_CONFIG";

/// Base URL baked in at build time, if `RAG_UI_API_BASE_URL` was set then.
const BUILD_BASE_URL: Option<&str> = option_env!("RAG_UI_API_BASE_URL");

/// Backend section.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ApiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Chat view section.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

/// Upload view section.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UploadSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_upload_threshold_bytes: Option<u64>,
}

/// Local store section.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StorageSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LoggingSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Full config. Every field is optional; defaults apply when absent.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub upload: UploadSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Config {
    pub fn top_k(&self) -> u32 {
        self.chat.top_k.filter(|k| *k > 0).unwrap_or(DEFAULT_TOP_K)
    }

    pub fn slow_upload_threshold(&self) -> u64 {
        self.upload
            .slow_upload_threshold_bytes
            .unwrap_or(DEFAULT_SLOW_UPLOAD_THRESHOLD)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or("info")
    }

    /// Directory for the local store: `storage.dir` (with `~/` expanded) or `~/.rag-ui/data`.
    pub fn data_dir(&self) -> Option<PathBuf> {
        match self.storage.dir.as_deref() {
            Some(dir) => Some(expand_home(dir)),
            None => Some(app_dir()?.join("data")),
        }
    }

    /// Backend base URL, first hit wins: `explicit`, the runtime environment,
    /// `api.base_url`, the build-time environment, [`DEFAULT_BASE_URL`].
    pub fn resolve_base_url(&self, explicit: Option<&str>) -> String {
        let runtime = std::env::var(BASE_URL_ENV).ok();
        let url = [
            explicit,
            runtime.as_deref(),
            self.api.base_url.as_deref(),
            BUILD_BASE_URL,
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_BASE_URL);
        url.trim_end_matches('/').to_string()
    }
}

fn app_dir() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(".rag-ui"))
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Returns the default config file path: `~/.rag-ui/config.yaml` (platform-specific home).
pub fn default_config_path() -> Option<PathBuf> {
    Some(app_dir()?.join("config.yaml"))
}

/// Resolve config path from optional override, `RAG_UI_CONFIG`, or the default.
pub fn resolve_config_path(override_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(p) = override_path {
        return Ok(p.to_path_buf());
    }
    if let Some(val) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(val));
    }
    default_config_path().ok_or(ConfigError::NoHome)
}

/// Load config from a YAML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`load`], but a missing file yields the default config.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    load(path)
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let contents = serde_yaml::to_string(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, contents).map_err(io_err)
}

/// Config load/save error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cannot determine home directory (set --config or RAG_UI_CONFIG)")]
    NoHome,
}
