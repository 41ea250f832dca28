//! Client for the analysis service's session API.
//!
//! One analysis is one session: create it, send a single prompt, read the
//! text parts of the reply, then delete the session. [`SessionClient::run_prompt`]
//! wraps that sequence so the delete always follows a successful create.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::errors::HookError;

/// Longest wait honoured for one analysis or health check; larger values are clamped.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline `wait` from now, clamped to [`MAX_WAIT`].
fn deadline_after(wait: Duration) -> Instant {
    if wait > MAX_WAIT {
        warn!(requested = ?wait, clamped = ?MAX_WAIT, "Wait too long, clamping");
    }
    Instant::now() + wait.min(MAX_WAIT)
}

/// A live session on the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisSession {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessagePart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    parts: Vec<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageInfo {
    #[serde(default)]
    error: Option<MessageError>,
}

#[derive(Debug, Deserialize)]
struct MessageError {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    info: MessageInfo,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

pub struct SessionClient {
    base_url: String,
    http_client: Client,
    cleanup_timeout: Duration,
}

impl SessionClient {
    /// Build a client with a Basic auth header computed once.
    ///
    /// # Errors
    ///
    /// Returns `HookError::Http` if the credentials do not form a valid header
    /// or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        request_timeout: Duration,
        cleanup_timeout: Duration,
    ) -> Result<Self, HookError> {
        let credentials = STANDARD.encode(format!("{username}:{password}"));
        let mut auth_value = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| HookError::Http(format!("Invalid Authorization header: {e}")))?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);

        let http_client = Client::builder()
            .timeout(request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| HookError::Http(format!("Failed to build analysis HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            cleanup_timeout,
        })
    }

    async fn failure(what: &str, response: reqwest::Response) -> HookError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
        HookError::Analysis(format!("{what} failed: status {status}: {body}"))
    }

    pub async fn create_session(&self, title: &str) -> Result<AnalysisSession, HookError> {
        let response = self
            .http_client
            .post(format!("{}/session", self.base_url))
            .json(&json!({ "title": title }))
            .send()
            .await?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
            return Err(Self::failure("create session", response).await);
        }
        let session: AnalysisSession = response.json().await?;
        info!(session_id = %session.id, title, "Analysis session created");
        Ok(session)
    }

    /// Send one prompt and return the concatenated text parts of the reply.
    pub async fn send_message(&self, session_id: &str, prompt: &str) -> Result<String, HookError> {
        let request = MessageRequest {
            parts: vec![MessagePart {
                kind: "text".to_string(),
                text: prompt.to_string(),
            }],
        };
        info!(session_id, prompt_len = prompt.len(), "Sending prompt to analysis service");
        #[cfg(feature = "debug-logs")]
        debug!(session_id, prompt = %prompt, "Analysis prompt");
        #[cfg(not(feature = "debug-logs"))]
        debug!(session_id, "Analysis prompt: [... content masked, enable debug-logs feature to view ...]");

        let response = self
            .http_client
            .post(format!("{}/session/{session_id}/message", self.base_url))
            .json(&request)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Self::failure("send message", response).await);
        }
        let reply: MessageResponse = response.json().await?;
        if let Some(err) = reply.info.error {
            return Err(HookError::Analysis(format!("{}: {}", err.name, err.message)));
        }

        let text: String = reply
            .parts
            .into_iter()
            .filter(|p| p.kind == "text")
            .map(|p| p.text)
            .collect();
        if text.is_empty() {
            return Err(HookError::Analysis("analysis service returned empty response".to_string()));
        }
        info!(session_id, response_len = text.len(), "Received analysis response");
        Ok(text)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), HookError> {
        let response = self
            .http_client
            .delete(format!("{}/session/{session_id}", self.base_url))
            .send()
            .await?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) {
            return Err(Self::failure("delete session", response).await);
        }
        info!(session_id, "Analysis session deleted");
        Ok(())
    }

    /// Create a session, send `prompt`, and delete the session.
    ///
    /// Create and send share `budget`. The delete runs after every successful
    /// create under its own cleanup timeout; a failed delete is only logged.
    pub async fn run_prompt(&self, title: &str, prompt: &str, budget: Duration) -> Result<String, HookError> {
        let deadline = deadline_after(budget);
        let budget = budget.min(MAX_WAIT);
        let timed_out = || HookError::Analysis(format!("analysis timed out after {budget:?}"));

        let session = timeout_at(deadline, self.create_session(title))
            .await
            .map_err(|_| timed_out())??;

        let outcome = match timeout_at(deadline, self.send_message(&session.id, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(timed_out()),
        };

        match timeout(self.cleanup_timeout, self.delete_session(&session.id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(session_id = %session.id, error = %e, "Failed to delete analysis session"),
            Err(_) => warn!(session_id = %session.id, "Timed out deleting analysis session"),
        }

        outcome
    }

    /// Poll `GET /global/health` until it answers 2xx or `max_wait` elapses.
    pub async fn wait_until_healthy(&self, max_wait: Duration, interval: Duration) -> bool {
        let deadline = deadline_after(max_wait);
        let url = format!("{}/global/health", self.base_url);
        loop {
            match self.http_client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(url = %url, "Analysis service is healthy");
                    return true;
                }
                Ok(resp) => debug!(status = %resp.status(), "Analysis service not ready"),
                Err(e) => debug!(error = %e, "Analysis service unreachable"),
            }
            if Instant::now().checked_add(interval).is_none_or(|next| next > deadline) {
                warn!(url = %url, ?max_wait, "Analysis service did not become healthy");
                return false;
            }
            tokio::time::sleep(interval).await;
        }
    }
}
