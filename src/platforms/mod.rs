//! Third-party platform connection tracking.
//!
//! Connection state lives for the browsing session and beyond: an ordered
//! connected-platforms list and a per-platform login-status record are
//! JSON-serialized under fixed file names in the state directory, loaded
//! once at startup and written atomically on every mutation. A recorded
//! "connected" status is only trusted within a staleness window; after
//! that the platform must be re-verified before it counts as connected.

pub mod connect;
pub mod verify;

use crate::config::PlatformEntry;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File holding the ordered list of connected platform names.
pub const CONNECTED_PLATFORMS_FILE: &str = "connected_platforms.json";
/// File holding the per-platform login-status records.
pub const LOGIN_STATUS_FILE: &str = "platform_login_status.json";

/// One platform's recorded login status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    /// What the last check concluded.
    pub connected: bool,
    /// When that conclusion was reached.
    pub last_checked: DateTime<Utc>,
}

/// Known platforms, looked up by name.
#[derive(Debug, Clone)]
pub struct PlatformCatalog {
    entries: Vec<PlatformEntry>,
}

impl PlatformCatalog {
    pub fn new(entries: Vec<PlatformEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&PlatformEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Persisted platform-connection state.
///
/// Explicitly constructed and passed around (never ambient), so it can be
/// pointed at a temp directory in tests.
#[derive(Debug)]
pub struct ConnectionStore {
    dir: PathBuf,
    staleness: Duration,
    statuses: HashMap<String, PlatformStatus>,
    connected: Vec<String>,
}

impl ConnectionStore {
    /// Open the store, rehydrating any state persisted under `dir`.
    ///
    /// Missing files mean a fresh profile; unreadable files are logged and
    /// treated as empty rather than wedging startup.
    pub fn open(dir: &Path, staleness_secs: u64) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let statuses = load_json(&dir.join(LOGIN_STATUS_FILE)).unwrap_or_default();
        let connected = load_json(&dir.join(CONNECTED_PLATFORMS_FILE)).unwrap_or_default();

        Ok(Self {
            dir: dir.to_path_buf(),
            staleness: Duration::seconds(staleness_secs as i64),
            statuses,
            connected,
        })
    }

    /// The ordered connected-platforms list as last recorded.
    pub fn connected_platforms(&self) -> &[String] {
        &self.connected
    }

    /// The raw stored record for a platform, staleness not applied.
    pub fn status(&self, platform: &str) -> Option<&PlatformStatus> {
        self.statuses.get(platform)
    }

    /// Whether `platform` counts as connected right now.
    pub fn is_connected(&self, platform: &str) -> bool {
        self.is_connected_at(platform, Utc::now())
    }

    /// Staleness-aware connectivity check against an explicit clock.
    ///
    /// True only if a record exists, is marked connected, and was checked
    /// within the staleness window — an old "connected" record does not
    /// count and must be re-verified.
    pub fn is_connected_at(&self, platform: &str, now: DateTime<Utc>) -> bool {
        match self.statuses.get(platform) {
            Some(status) => status.connected && now - status.last_checked <= self.staleness,
            None => false,
        }
    }

    /// Record a check result, stamping the current time and persisting.
    pub fn record_status(&mut self, platform: &str, connected: bool) -> Result<()> {
        self.record_status_at(platform, connected, Utc::now())
    }

    /// [`ConnectionStore::record_status`] against an explicit clock.
    pub fn record_status_at(
        &mut self,
        platform: &str,
        connected: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.statuses.insert(
            platform.to_string(),
            PlatformStatus {
                connected,
                last_checked: now,
            },
        );

        // Keep the connected list in sync, preserving insertion order.
        if connected {
            if !self.connected.iter().any(|name| name == platform) {
                self.connected.push(platform.to_string());
            }
        } else {
            self.connected.retain(|name| name != platform);
        }

        self.save()
    }

    /// Platforms in the connected list whose status is no longer trusted
    /// under the staleness rule — the re-verification loop's work list.
    pub fn stale_connected(&self, now: DateTime<Utc>) -> Vec<String> {
        self.connected
            .iter()
            .filter(|name| !self.is_connected_at(name, now))
            .cloned()
            .collect()
    }

    fn save(&self) -> Result<()> {
        crate::persist::write_json_atomic(&self.dir.join(LOGIN_STATUS_FILE), &self.statuses)?;
        crate::persist::write_json_atomic(
            &self.dir.join(CONNECTED_PLATFORMS_FILE),
            &self.connected,
        )
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable state file ignored");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt state file ignored");
            None
        }
    }
}
