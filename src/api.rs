//! HTTP client for the Ellipsis generation backend.
//!
//! Wraps a single shared [`reqwest::Client`] and exposes the backend's
//! JSON endpoints: job start/cancel, trending topics, Podbean publishing,
//! and platform-connection management.
//!
//! The request timeout applies per JSON call, not at the client level —
//! the client is shared with the long-lived SSE progress stream, which
//! must stay open for as long as a generation job runs.

use crate::config::BackendConfig;
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Connection-establishment bound for the shared client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response from `POST /api/generate`.
///
/// The shape has evolved: async flows report a job identifier and stream
/// progress over SSE, while older synchronous flows return the finished
/// result inline. All fields are therefore optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    /// Identifier for the in-flight job, used only for cancellation.
    #[serde(default, alias = "jobId")]
    pub job_id: Option<String>,
    /// Finished script as `(speaker, line)` pairs (synchronous flow).
    #[serde(default)]
    pub final_script: Option<Vec<(String, String)>>,
    /// Persona responses in `[general_public, critic]` order (synchronous flow).
    #[serde(default)]
    pub responses: Option<Vec<String>>,
    /// Backend-relative path of the finished narration (synchronous flow).
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// A trending topic suggestion from `GET /api/trending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingTopic {
    pub title: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    topics: Vec<TrendingTopic>,
}

#[derive(Debug, Deserialize)]
struct ConnectedPlatformsResponse {
    connected_platforms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OauthUrlResponse {
    oauth_url: String,
}

/// Client for the Ellipsis backend HTTP API.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    request_timeout: Duration,
}

impl BackendClient {
    /// Create a client from backend configuration.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Request(format!("failed to build HTTP client: {e}")))?;
        let mut client = Self::with_http(http, &config.base_url)?;
        client.request_timeout = Duration::from_secs(config.request_timeout_secs);
        Ok(client)
    }

    /// Create a client with an existing `reqwest::Client` (useful in tests).
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            ClientError::Config(format!("invalid backend base URL '{base_url}': {e}"))
        })?;
        Ok(Self {
            http,
            base,
            request_timeout: Duration::from_secs(30),
        })
    }

    /// The backend origin, used to resolve relative audio paths.
    pub fn origin(&self) -> &Url {
        &self.base
    }

    /// The underlying HTTP client (shared with the SSE channel).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Config(format!("invalid endpoint path '{path}': {e}")))
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        self.http
            .post(url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Request(format!("POST {path} failed: {e}")))
    }

    async fn get_json(&self, path: &str) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        self.http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ClientError::Request(format!("GET {path} failed: {e}")))
    }

    /// Start a generation job for the given topic prompt.
    pub async fn start_generation(&self, query: &str) -> Result<GenerateResponse> {
        let response = self
            .post_json("api/generate", serde_json::json!({ "query": query }))
            .await?;
        let response = check_status(response).await?;
        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ClientError::Api(format!("malformed generate response: {e}")))
    }

    /// Ask the backend to abandon an in-flight job. Best effort only.
    pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
        let response = self
            .post_json("api/cancel", serde_json::json!({ "jobId": job_id }))
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// Fetch trending topic suggestions.
    pub async fn trending_topics(&self) -> Result<Vec<TrendingTopic>> {
        let response = self.get_json("api/trending").await?;
        let response = check_status(response).await?;
        let parsed: TrendingResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Api(format!("malformed trending response: {e}")))?;
        Ok(parsed.topics)
    }

    /// Publish a finished episode to Podbean via the backend's MCP bridge.
    pub async fn publish_to_podbean(
        &self,
        audio_url: &str,
        notes: &str,
    ) -> Result<serde_json::Value> {
        let response = self
            .post_json(
                "api/podbean/publish",
                serde_json::json!({ "audioUrl": audio_url, "notes": notes }),
            )
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = body_snippet(response).await;
            return Err(ClientError::Publish(format!("HTTP {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Publish(format!("malformed publish response: {e}")))
    }

    /// Register a platform as connected on the backend.
    pub async fn connect_platform(&self, platform: &str) -> Result<()> {
        let response = self
            .post_json("api/connect", serde_json::json!({ "platform": platform }))
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// Register a platform as disconnected on the backend.
    pub async fn disconnect_platform(&self, platform: &str) -> Result<()> {
        let response = self
            .post_json("api/disconnect", serde_json::json!({ "platform": platform }))
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// The backend's view of which platforms are connected.
    pub async fn connected_platforms(&self) -> Result<Vec<String>> {
        let response = self.get_json("api/connected_platforms").await?;
        let response = check_status(response).await?;
        let parsed: ConnectedPlatformsResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Api(format!("malformed connected-platforms response: {e}")))?;
        Ok(parsed.connected_platforms)
    }

    /// Fetch the external login URL for a platform.
    pub async fn oauth_url(&self, platform: &str) -> Result<String> {
        let path = format!("api/oauth_url/{}", urlencoding::encode(platform));
        let response = self.get_json(&path).await?;
        let response = check_status(response).await?;
        let parsed: OauthUrlResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Api(format!("malformed oauth-url response: {e}")))?;
        Ok(parsed.oauth_url)
    }
}

/// Map a non-success response to [`ClientError::Api`] with a body snippet.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = body_snippet(response).await;
    Err(ClientError::Api(format!("HTTP {status}: {body}")))
}

async fn body_snippet(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        "no response body".to_string()
    } else {
        body.chars().take(500).collect()
    }
}
