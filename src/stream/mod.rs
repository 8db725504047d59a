//! Typed event channel over the backend's SSE progress stream.
//!
//! The backend pushes generation progress as named SSE events on
//! `GET /stream`. [`EventChannel`] owns exactly one such connection,
//! decodes frames with [`sse::SseFrameDecoder`], and demultiplexes them
//! into the closed [`ChannelEvent`] union. Anything that does not match a
//! known tag — untyped frames, unknown event names, unknown status or
//! persona values, malformed JSON — is logged and dropped rather than
//! trusted.
//!
//! Transport errors are logged and close the channel; there is no
//! automatic reconnect. Losing the stream never fails the job — the
//! job-start response is the fallback for a finished result.

pub mod sse;

use crate::error::{ClientError, Result};
use futures_util::StreamExt;
use sse::{SseFrame, SseFrameDecoder};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Persona name the backend uses for the general-public viewpoint.
const PERSONA_GENERAL_PUBLIC: &str = "Sarah";
/// Persona name the backend uses for the critic viewpoint.
const PERSONA_CRITIC: &str = "John";

/// Buffer size for the typed event queue.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Which persona response slot an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonaSlot {
    /// The general-public viewpoint ("Sarah").
    GeneralPublic,
    /// The critic viewpoint ("John").
    Critic,
}

impl PersonaSlot {
    /// Map a wire persona name to its slot. Unknown names yield `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            PERSONA_GENERAL_PUBLIC => Some(Self::GeneralPublic),
            PERSONA_CRITIC => Some(Self::Critic),
            _ => None,
        }
    }
}

/// Pipeline status values carried by `status` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    InitialResponseGenerationStarted,
    MadStarted,
    ScriptReady,
    AudioGenerationStarted,
    AudioError,
    PodcastGenerated,
}

impl JobStatus {
    /// Map a wire status string to its variant. Unknown values yield `None`
    /// and must be treated as a no-op, not an error.
    pub fn from_wire(status: &str) -> Option<Self> {
        match status {
            "initial_response_generation_started" => Some(Self::InitialResponseGenerationStarted),
            "mad_started" => Some(Self::MadStarted),
            "script_ready" => Some(Self::ScriptReady),
            "audio_generation_started" => Some(Self::AudioGenerationStarted),
            "audio_error" => Some(Self::AudioError),
            "podcast_generated" => Some(Self::PodcastGenerated),
            _ => None,
        }
    }
}

/// A typed progress event from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Pipeline stage announcement.
    Status {
        status: JobStatus,
        message: Option<String>,
    },
    /// A persona response arrived or was updated.
    Persona { slot: PersonaSlot, response: String },
    /// A (possibly updated) script text.
    Script { script: String },
    /// The narration audio is ready at this absolute URL.
    Audio { url: String },
}

/// Demultiplex one SSE frame into a typed event.
///
/// Relative audio paths are resolved against `origin`. Returns `None` for
/// anything outside the known contract.
pub fn parse_frame(frame: &SseFrame, origin: &Url) -> Option<ChannelEvent> {
    let Some(event_name) = frame.event.as_deref() else {
        tracing::debug!(data = %frame.data, "untyped stream frame ignored");
        return None;
    };

    let payload: serde_json::Value = match serde_json::from_str(&frame.data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(event = event_name, error = %e, "malformed stream payload ignored");
            return None;
        }
    };

    match event_name {
        "status" => {
            let raw = payload.get("status").and_then(|v| v.as_str())?;
            let Some(status) = JobStatus::from_wire(raw) else {
                tracing::debug!(status = raw, "unknown status value ignored");
                return None;
            };
            let message = payload
                .get("message")
                .and_then(|v| v.as_str())
                .map(String::from);
            Some(ChannelEvent::Status { status, message })
        }

        "persona" => {
            let name = payload.get("persona").and_then(|v| v.as_str())?;
            let Some(slot) = PersonaSlot::from_wire(name) else {
                tracing::debug!(persona = name, "unknown persona ignored");
                return None;
            };
            let response = payload.get("response").and_then(|v| v.as_str())?;
            Some(ChannelEvent::Persona {
                slot,
                response: response.to_string(),
            })
        }

        "script" => {
            let script = payload.get("script").and_then(|v| v.as_str())?;
            Some(ChannelEvent::Script {
                script: script.to_string(),
            })
        }

        "audio" => {
            let path = payload.get("audio").and_then(|v| v.as_str())?;
            match origin.join(path) {
                Ok(url) => Some(ChannelEvent::Audio {
                    url: url.to_string(),
                }),
                Err(e) => {
                    tracing::warn!(path, error = %e, "unresolvable audio path ignored");
                    None
                }
            }
        }

        other => {
            tracing::debug!(event = other, "unknown stream event ignored");
            None
        }
    }
}

/// A live progress-stream connection.
///
/// Opened once per generation view; dropped or closed unconditionally on
/// teardown — the reader task is cancelled and no connection lingers.
pub struct EventChannel {
    events: mpsc::Receiver<ChannelEvent>,
    cancel: CancellationToken,
    reader: Option<tokio::task::JoinHandle<()>>,
}

impl EventChannel {
    /// Open the progress stream at `{origin}/stream`.
    ///
    /// Fails only if the connection itself cannot be established; once
    /// open, all stream-level errors are logged and end the channel
    /// without surfacing as failures.
    pub async fn open(http: &reqwest::Client, origin: &Url) -> Result<Self> {
        let url = origin
            .join("stream")
            .map_err(|e| ClientError::Channel(format!("invalid stream URL: {e}")))?;

        let response = http
            .get(url)
            .header("accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| ClientError::Channel(format!("failed to open stream: {e}")))?;

        if !response.status().is_success() {
            return Err(ClientError::Channel(format!(
                "stream endpoint returned HTTP {}",
                response.status()
            )));
        }

        tracing::debug!("progress stream opened");

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let reader_cancel = cancel.clone();
        let origin = origin.clone();

        let reader = tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseFrameDecoder::new();

            loop {
                let chunk = tokio::select! {
                    _ = reader_cancel.cancelled() => {
                        tracing::debug!("progress stream closed by teardown");
                        return;
                    }
                    chunk = bytes.next() => chunk,
                };

                match chunk {
                    Some(Ok(chunk)) => {
                        for frame in decoder.push(&chunk) {
                            if let Some(event) = parse_frame(&frame, &origin)
                                && tx.send(event).await.is_err()
                            {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        // Transport loss is best-effort by contract: log and
                        // end the channel without failing the job.
                        tracing::error!(error = %e, "progress stream read error");
                        return;
                    }
                    None => {
                        if let Some(frame) = decoder.finish()
                            && let Some(event) = parse_frame(&frame, &origin)
                        {
                            let _ = tx.send(event).await;
                        }
                        tracing::debug!("progress stream ended");
                        return;
                    }
                }
            }
        });

        Ok(Self {
            events: rx,
            cancel,
            reader: Some(reader),
        })
    }

    /// Receive the next typed event. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Close the channel and wait for the reader task to wind down.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
