//! Wires the progress stream, session state machine, and job lifecycle
//! together, and broadcasts [`UiEvent`]s to whatever front end is attached.

use crate::api::BackendClient;
use crate::error::Result;
use crate::events::UiEvent;
use crate::job::JobLifecycle;
use crate::session::GenerationSession;
use crate::stream::{ChannelEvent, EventChannel};
use tokio::sync::broadcast;

/// Broadcast capacity for UI events. Slow subscribers lag, they do not
/// block the stream.
const UI_EVENT_CAPACITY: usize = 64;

/// Owns one generation session end to end.
pub struct SessionCoordinator {
    client: BackendClient,
    session: GenerationSession,
    jobs: JobLifecycle,
    events: broadcast::Sender<UiEvent>,
}

impl SessionCoordinator {
    pub fn new(client: BackendClient) -> Self {
        let (events, _) = broadcast::channel(UI_EVENT_CAPACITY);
        Self {
            jobs: JobLifecycle::new(client.clone()),
            client,
            session: GenerationSession::new(),
            events,
        }
    }

    /// Subscribe to UI events.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    /// Read-only view of the session state.
    pub fn session(&self) -> &GenerationSession {
        &self.session
    }

    /// Whether a prompt may be submitted right now: nothing has been
    /// started yet, the previous job finished (`audioReady`), or the
    /// previous start failed outright.
    pub fn can_submit(&self) -> bool {
        self.jobs.active().is_none() || self.session.can_submit_next()
    }

    /// Whether a job is currently in flight (started and not yet terminal).
    pub fn job_in_flight(&self) -> bool {
        self.jobs.active().is_some() && !self.session.stage().is_terminal()
    }

    /// Whether quitting now should first ask the user to confirm.
    pub fn exit_confirmation_required(&self) -> bool {
        self.job_in_flight()
    }

    /// Submit a topic prompt, resetting the session and starting a new job.
    ///
    /// A submission that is not currently allowed is a no-op returning
    /// `Ok(false)`. A failed job start is surfaced as
    /// [`UiEvent::JobStartFailed`] and leaves the coordinator submittable
    /// rather than stalled.
    pub async fn submit(&mut self, prompt: &str) -> Result<bool> {
        if !self.can_submit() {
            tracing::debug!("submission ignored: job in flight");
            return Ok(false);
        }

        self.session.reset();
        self.emit_stage();

        match self.jobs.start(prompt).await {
            Ok(response) => {
                // Older deployments finish synchronously; reflect any inline
                // result immediately.
                self.session.apply_completed(&response, self.client.origin());
                self.emit_content_updates();
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start generation job");
                let _ = self.events.send(UiEvent::JobStartFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Apply one typed progress event and broadcast what changed.
    pub fn handle_event(&mut self, event: &ChannelEvent) {
        let moved = self.session.apply(event);
        if moved.is_some() {
            self.emit_stage();
        }

        match event {
            ChannelEvent::Persona { slot, response } => {
                let _ = self.events.send(UiEvent::PersonaUpdated {
                    slot: *slot,
                    response: response.clone(),
                });
            }
            ChannelEvent::Script { script } => {
                // Mirror the session's ignore-blank rule for listeners.
                if !script.trim().is_empty() {
                    let _ = self.events.send(UiEvent::ScriptUpdated {
                        script: script.clone(),
                    });
                }
            }
            ChannelEvent::Audio { .. } => {
                if let Some(url) = self.session.audio_url() {
                    let _ = self.events.send(UiEvent::AudioAvailable {
                        url: url.to_string(),
                    });
                }
            }
            ChannelEvent::Status { .. } => {}
        }
    }

    /// Drain a progress channel until it closes or the session reaches a
    /// terminal stage.
    pub async fn run(&mut self, channel: &mut EventChannel) {
        while !self.session.stage().is_terminal() {
            match channel.recv().await {
                Some(event) => self.handle_event(&event),
                None => {
                    let _ = self.events.send(UiEvent::ChannelClosed);
                    return;
                }
            }
        }
    }

    /// Return to a fresh session (the "back to home" path). Does not signal
    /// the backend; use [`SessionCoordinator::shutdown`] for that.
    pub fn reset(&mut self) {
        self.session.reset();
        self.jobs.clear();
        self.emit_stage();
    }

    /// Best-effort teardown: fire cancellation if a job is in flight.
    pub fn shutdown(&mut self) {
        if self.job_in_flight() {
            self.jobs.cancel_in_flight();
        }
    }

    /// Publish the finished narration to Podbean.
    ///
    /// Failures are broadcast so the UI keeps the notes text for retry.
    pub async fn publish(&self, notes: &str) -> Result<serde_json::Value> {
        let Some(audio_url) = self.session.audio_url() else {
            return Err(crate::error::ClientError::Publish(
                "no narration audio to publish yet".to_string(),
            ));
        };

        match self.client.publish_to_podbean(audio_url, notes).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                let _ = self.events.send(UiEvent::PublishFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn emit_stage(&self) {
        let _ = self.events.send(UiEvent::StageChanged {
            stage: self.session.stage(),
            header: self.session.header_text(),
        });
    }

    /// Broadcast any content already present on the session (used after a
    /// synchronous completion).
    fn emit_content_updates(&self) {
        if let Some(script) = self.session.script() {
            let _ = self.events.send(UiEvent::ScriptUpdated {
                script: script.to_string(),
            });
        }
        if let Some(url) = self.session.audio_url() {
            let _ = self.events.send(UiEvent::AudioAvailable {
                url: url.to_string(),
            });
        }
        if self.session.stage().is_terminal() {
            self.emit_stage();
        }
    }
}
