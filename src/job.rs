//! Generation job lifecycle: start, in-flight tracking, best-effort cancel.

use crate::api::{BackendClient, GenerateResponse};
use crate::error::Result;
use std::time::Duration;

/// Upper bound on the fire-and-forget cancellation request. Cancellation is
/// advisory; shutdown must never wait longer than this for delivery.
const CANCEL_DEADLINE: Duration = Duration::from_secs(2);

/// Opaque identifier correlating a client-initiated generation request with
/// its asynchronous progress and cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Starts jobs and owns the active [`JobHandle`], if any.
#[derive(Debug)]
pub struct JobLifecycle {
    client: BackendClient,
    active: Option<JobHandle>,
}

impl JobLifecycle {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            active: None,
        }
    }

    /// The active job handle. `None` before the first job starts, and after
    /// a start failure or [`JobLifecycle::clear`].
    pub fn active(&self) -> Option<&JobHandle> {
        self.active.as_ref()
    }

    /// Forget the active job without signalling the backend.
    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Start a generation job for `prompt`.
    ///
    /// On success the returned response may carry a job id (async flow)
    /// and/or a finished result (synchronous flow); the id, when present,
    /// becomes the active handle. On failure no job is considered active.
    pub async fn start(&mut self, prompt: &str) -> Result<GenerateResponse> {
        self.active = None;
        let response = self.client.start_generation(prompt).await?;
        self.active = response.job_id.clone().map(JobHandle::new);
        match self.active {
            Some(ref handle) => tracing::info!(job = handle.id(), "generation job started"),
            None => tracing::info!("generation completed synchronously (no job id)"),
        }
        Ok(response)
    }

    /// Fire a best-effort cancellation for the active job, if any.
    ///
    /// Returns immediately; the request runs on a detached task bounded by
    /// [`CANCEL_DEADLINE`]. Delivery is not guaranteed and no retry is made.
    pub fn cancel_in_flight(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            let result =
                tokio::time::timeout(CANCEL_DEADLINE, client.cancel_job(handle.id())).await;
            match result {
                Ok(Ok(())) => tracing::info!(job = handle.id(), "cancellation delivered"),
                Ok(Err(e)) => {
                    tracing::warn!(job = handle.id(), error = %e, "cancellation not delivered");
                }
                Err(_) => tracing::warn!(job = handle.id(), "cancellation timed out"),
            }
        });
    }
}
