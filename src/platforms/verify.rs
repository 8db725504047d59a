//! Best-effort platform reachability verification.

use crate::error::{ClientError, Result};
use crate::events::UiEvent;
use crate::platforms::{ConnectionStore, PlatformCatalog};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// What a verification concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Connected,
    Disconnected,
}

/// Checks platform dashboards and records the result.
pub struct PlatformVerifier {
    http: reqwest::Client,
    catalog: PlatformCatalog,
    store: Arc<Mutex<ConnectionStore>>,
    events: broadcast::Sender<UiEvent>,
}

impl PlatformVerifier {
    pub fn new(
        http: reqwest::Client,
        catalog: PlatformCatalog,
        store: Arc<Mutex<ConnectionStore>>,
        events: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            http,
            catalog,
            store,
            events,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<ConnectionStore>> {
        &self.store
    }

    pub fn catalog(&self) -> &PlatformCatalog {
        &self.catalog
    }

    /// Record a platform as connected without probing (used when the login
    /// window itself proved the session).
    pub fn record_connected(&self, platform: &str) -> Result<()> {
        self.record(platform, true)
    }

    /// Probe the platform's dashboard and record the conclusion.
    ///
    /// Any failure — network error or non-success status — records the
    /// platform as disconnected and asks the UI to reopen the connect
    /// dialog. Only the storage layer can make this return an error.
    pub async fn verify(&self, platform: &str) -> Result<VerifyOutcome> {
        let entry = self
            .catalog
            .get(platform)
            .ok_or_else(|| ClientError::Connect(format!("unknown platform '{platform}'")))?;

        let reachable = match self.http.get(&entry.dashboard_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(platform, error = %e, "dashboard probe failed");
                false
            }
        };

        self.record(platform, reachable)?;
        if reachable {
            tracing::info!(platform, "platform verified");
            Ok(VerifyOutcome::Connected)
        } else {
            tracing::info!(platform, "platform verification failed");
            let _ = self.events.send(UiEvent::ConnectPromptRequested {
                platform: platform.to_string(),
            });
            Ok(VerifyOutcome::Disconnected)
        }
    }

    fn record(&self, platform: &str, connected: bool) -> Result<()> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| ClientError::Storage("connection store poisoned".to_string()))?;
        store.record_status(platform, connected)
    }

    /// Spawn the periodic re-verification loop.
    ///
    /// Every `interval`, each platform still on the connected list whose
    /// status has gone stale is re-verified. The task ends when `cancel`
    /// fires; callers own the token and must trip it on teardown.
    pub fn spawn_reverification(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a freshly
            // rehydrated store is not probed before anyone needs it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("re-verification loop stopped");
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                let stale = match self.store.lock() {
                    Ok(store) => store.stale_connected(Utc::now()),
                    Err(_) => {
                        tracing::error!("connection store poisoned; stopping re-verification");
                        return;
                    }
                };

                for platform in stale {
                    if let Err(e) = self.verify(&platform).await {
                        tracing::warn!(platform, error = %e, "re-verification failed");
                    }
                }
            }
        })
    }
}
