//! Configuration types for the Ellipsis client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend connection settings.
    pub backend: BackendConfig,
    /// Platform connection tracking settings.
    pub platforms: PlatformsConfig,
    /// Login-window (popup) settings for the connect flow.
    pub popup: PopupConfig,
    /// Client state storage settings.
    pub storage: StorageConfig,
}

/// Backend connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the generation backend.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Platform connection tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    /// How long a recorded "connected" status stays trusted, in seconds.
    pub staleness_secs: u64,
    /// How often connected platforms are re-verified, in seconds.
    pub reverify_interval_secs: u64,
    /// Known platforms. Replaces the built-in catalog when non-empty.
    pub catalog: Vec<PlatformEntry>,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            staleness_secs: 300,
            reverify_interval_secs: 30,
            catalog: Vec::new(),
        }
    }
}

/// A third-party platform the user can connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Display name, also the backend identifier (e.g. `"LinkedIn"`).
    pub name: String,
    /// Logged-in landing page used by reachability verification.
    pub dashboard_url: String,
    /// Substring of the post-login URL that marks a successful sign-in.
    pub success_url_pattern: String,
}

/// The platforms the Ellipsis backend knows how to publish to.
pub fn default_catalog() -> Vec<PlatformEntry> {
    vec![
        PlatformEntry {
            name: "LinkedIn".to_string(),
            dashboard_url: "https://www.linkedin.com/feed/".to_string(),
            success_url_pattern: "linkedin.com/feed".to_string(),
        },
        PlatformEntry {
            name: "Reddit".to_string(),
            dashboard_url: "https://www.reddit.com/".to_string(),
            success_url_pattern: "reddit.com".to_string(),
        },
        PlatformEntry {
            name: "Twitter".to_string(),
            dashboard_url: "https://x.com/home".to_string(),
            success_url_pattern: "x.com/home".to_string(),
        },
    ]
}

/// Login-window configuration for the platform connect flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    /// Window width in pixels.
    pub width: u32,
    /// Window height in pixels.
    pub height: u32,
    /// URL poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// How long to wait for a successful login before falling back, in seconds.
    pub login_timeout_secs: u64,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 700,
            poll_interval_ms: 500,
            login_timeout_secs: 120,
        }
    }
}

/// Client state storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// State directory. `None` uses the platform data directory.
    pub state_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the directory that holds persisted client state.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ellipsis")
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::error::ClientError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|e| {
            crate::error::ClientError::Config(format!(
                "failed to parse config file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Write configuration to a TOML file atomically.
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let toml_str = toml::to_string_pretty(self).map_err(|e| {
            crate::error::ClientError::Config(format!("failed to serialize config: {e}"))
        })?;
        crate::persist::write_atomic(path, toml_str.as_bytes())
    }

    /// The platform catalog in effect: config override, or the built-in set.
    pub fn platform_catalog(&self) -> Vec<PlatformEntry> {
        if self.platforms.catalog.is_empty() {
            default_catalog()
        } else {
            self.platforms.catalog.clone()
        }
    }
}
