//! Ellipsis client: headless front end for the Ellipsis content/podcast
//! generation backend.
//!
//! A topic prompt starts an asynchronous, multi-stage generation job on the
//! backend (research → persona responses → multi-agent debate → script →
//! narration audio). This crate tracks that job from the client side:
//!
//! # Architecture
//!
//! - **Event channel** (`stream`): one SSE connection per generation view,
//!   decoded into a closed typed-event union
//! - **Stage controller** (`session`): the monotonic stage state machine
//!   plus derived content (persona responses, script, audio URL)
//! - **Job lifecycle** (`job`, `coordinator`): job start, in-flight
//!   tracking, best-effort cancellation on exit
//! - **Connection tracker** (`platforms`): persisted, staleness-checked
//!   third-party platform connection state with periodic re-verification
//!   and a login-window connect flow

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod job;
mod persist;
pub mod platforms;
pub mod session;
pub mod stream;

pub use api::{BackendClient, GenerateResponse, TrendingTopic};
pub use config::ClientConfig;
pub use coordinator::SessionCoordinator;
pub use error::{ClientError, Result};
pub use events::UiEvent;
pub use job::JobHandle;
pub use session::{GenerationSession, GenerationStage, PersonaResponses};
pub use stream::{ChannelEvent, EventChannel, JobStatus, PersonaSlot};
