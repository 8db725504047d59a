//! Events emitted to the UI layer.
//!
//! Intentionally lightweight so the coordinator can emit without caring
//! whether anyone is listening.

use crate::session::GenerationStage;
use crate::stream::PersonaSlot;

/// What the client is doing "right now", for whatever front end is attached.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// The generation stage moved forward (or was reset).
    StageChanged {
        stage: GenerationStage,
        /// Presentational header for the new stage.
        header: String,
    },
    /// A persona response arrived or was replaced.
    PersonaUpdated { slot: PersonaSlot, response: String },
    /// The script arrived or was replaced.
    ScriptUpdated { script: String },
    /// Narration audio is playable/downloadable at this URL.
    AudioAvailable { url: String },
    /// The job-creation request failed; the prompt may be resubmitted.
    JobStartFailed { error: String },
    /// The progress stream ended (no automatic reconnect).
    ChannelClosed,
    /// A platform failed verification; the connect dialog should reopen.
    ConnectPromptRequested { platform: String },
    /// Publishing to Podbean failed; the notes text should be kept for retry.
    PublishFailed { error: String },
}
