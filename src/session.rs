//! Generation-session state machine.
//!
//! [`GenerationSession`] owns the canonical stage of one generation job and
//! the content derived from progress events: the two persona responses, the
//! script, and the narration audio URL. Stage movement is monotonic forward
//! under the transition table; out-of-order and duplicate events cannot
//! regress it. A new submission is the only way back to the start.

use crate::api::GenerateResponse;
use crate::stream::{ChannelEvent, JobStatus, PersonaSlot};
use serde::Serialize;
use url::Url;

/// The phase of one generation job as tracked by the client.
///
/// Progression: `Crawling → InitialResponses → Debate → ScriptReady →
/// AudioGenerating → {AudioError | AudioReady}`. The last two are terminal;
/// only a reset leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GenerationStage {
    Crawling,
    InitialResponses,
    Debate,
    ScriptReady,
    AudioGenerating,
    AudioError,
    AudioReady,
}

impl GenerationStage {
    /// Position in the forward progression. The two terminal stages share a
    /// rank so neither can displace the other.
    fn rank(self) -> u8 {
        match self {
            Self::Crawling => 0,
            Self::InitialResponses => 1,
            Self::Debate => 2,
            Self::ScriptReady => 3,
            Self::AudioGenerating => 4,
            Self::AudioError | Self::AudioReady => 5,
        }
    }

    /// Whether this stage ends the job (success or failure).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AudioError | Self::AudioReady)
    }
}

/// The two persona viewpoints generated early in the pipeline.
///
/// Slots fill incrementally as `persona` events arrive; an empty slot means
/// "not yet generated". Slots are never cleared except by a session reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonaResponses {
    /// The general-public viewpoint.
    pub general_public: Option<String>,
    /// The critic viewpoint.
    pub critic: Option<String>,
}

/// State for one generation session, owned for the lifetime of one job.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    stage: GenerationStage,
    responses: PersonaResponses,
    script: Option<String>,
    audio_url: Option<String>,
    error_message: Option<String>,
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationSession {
    /// A fresh session, waiting for research to begin.
    pub fn new() -> Self {
        Self {
            stage: GenerationStage::Crawling,
            responses: PersonaResponses::default(),
            script: None,
            audio_url: None,
            error_message: None,
        }
    }

    pub fn stage(&self) -> GenerationStage {
        self.stage
    }

    pub fn responses(&self) -> &PersonaResponses {
        &self.responses
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref()
    }

    /// Whether a follow-up prompt may be submitted right now.
    pub fn can_submit_next(&self) -> bool {
        self.stage == GenerationStage::AudioReady
    }

    /// Clear all content and return to the start of the progression.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Apply a typed progress event.
    ///
    /// Returns the new stage when the event moved it, `None` otherwise.
    pub fn apply(&mut self, event: &ChannelEvent) -> Option<GenerationStage> {
        match event {
            ChannelEvent::Status { status, message } => self.apply_status(*status, message.clone()),

            ChannelEvent::Persona { slot, response } => {
                match slot {
                    PersonaSlot::GeneralPublic => {
                        self.responses.general_public = Some(response.clone());
                    }
                    PersonaSlot::Critic => self.responses.critic = Some(response.clone()),
                }
                None
            }

            ChannelEvent::Script { script } => {
                // Blank payloads never clear an existing script.
                if !script.trim().is_empty() {
                    self.script = Some(script.clone());
                }
                None
            }

            ChannelEvent::Audio { url } => {
                self.audio_url = Some(url.clone());
                // Receipt of audio is itself the ready signal, whether or not
                // a podcast_generated status ever arrives.
                self.advance(GenerationStage::AudioReady)
            }
        }
    }

    fn apply_status(
        &mut self,
        status: JobStatus,
        message: Option<String>,
    ) -> Option<GenerationStage> {
        let target = match status {
            JobStatus::InitialResponseGenerationStarted => GenerationStage::InitialResponses,
            JobStatus::MadStarted => GenerationStage::Debate,
            JobStatus::ScriptReady => GenerationStage::ScriptReady,
            JobStatus::AudioGenerationStarted => GenerationStage::AudioGenerating,
            JobStatus::AudioError => GenerationStage::AudioError,
            JobStatus::PodcastGenerated => GenerationStage::AudioReady,
        };

        let moved = self.advance(target);
        if moved == Some(GenerationStage::AudioError) {
            self.error_message = message;
        }
        moved
    }

    /// Move to `target` only if it does not go backward. Duplicates and
    /// stale statuses are no-ops, as is any attempt to leave a terminal
    /// stage without a reset.
    fn advance(&mut self, target: GenerationStage) -> Option<GenerationStage> {
        if target.rank() > self.stage.rank() {
            self.stage = target;
            Some(target)
        } else {
            None
        }
    }

    /// Fold in a synchronously completed `/api/generate` response.
    ///
    /// Older backend deployments return the finished result inline instead
    /// of streaming it; relative audio paths resolve against `origin`.
    pub fn apply_completed(&mut self, response: &GenerateResponse, origin: &Url) {
        if let Some(ref pairs) = response.final_script {
            let script = pairs
                .iter()
                .map(|(speaker, line)| format!("**{speaker}:** {line}"))
                .collect::<Vec<_>>()
                .join("\n\n");
            if !script.trim().is_empty() {
                self.script = Some(script);
            }
        }

        if let Some(ref responses) = response.responses {
            if let Some(general) = responses.first() {
                self.responses.general_public = Some(general.clone());
            }
            if let Some(critic) = responses.get(1) {
                self.responses.critic = Some(critic.clone());
            }
        }

        if let Some(ref path) = response.audio_url {
            match origin.join(path) {
                Ok(url) => {
                    self.audio_url = Some(url.to_string());
                    self.advance(GenerationStage::AudioReady);
                }
                Err(e) => tracing::warn!(path, error = %e, "unresolvable audio path in response"),
            }
        }
    }

    /// Presentational header for the current stage.
    pub fn header_text(&self) -> String {
        match self.stage {
            GenerationStage::Crawling => "Researching your topic...".to_string(),
            GenerationStage::InitialResponses => "Generating initial responses...".to_string(),
            GenerationStage::Debate => "Agents are debating your script...".to_string(),
            GenerationStage::ScriptReady => "Script ready".to_string(),
            GenerationStage::AudioGenerating => "Generating narration audio...".to_string(),
            GenerationStage::AudioError => match self.error_message {
                Some(ref msg) => format!("Audio generation failed: {msg}"),
                None => "Audio generation failed".to_string(),
            },
            GenerationStage::AudioReady => "Your podcast is ready".to_string(),
        }
    }
}
