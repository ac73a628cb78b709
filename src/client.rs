//! HTTP client for the Agentic App Platform.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::api::{
    self, DebugConfig, DebugMode, ExecuteBody, RunStatus, SessionIdentityItem, StatusBody,
    StreamConfig, StreamMode,
};
use crate::config::Config;
use crate::error::{ApiError, ConfigError};
use crate::stream::{collect_streaming_reply, StatusFetcher};
use crate::types::{RunReply, StatusReply};

/// Per-call options for [`AgenticClient::execute_run`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// User identity; falls back to the session reference when unset.
    pub user_reference: Option<String>,
    /// Enables streaming when set.
    pub stream_mode: Option<StreamMode>,
    pub debug: bool,
    pub debug_mode: Option<DebugMode>,
    pub metadata: Option<Map<String, Value>>,
}

/// Client for one configured app and environment.
#[derive(Debug)]
pub struct AgenticClient {
    http: reqwest::Client,
    config: Config,
}

impl AgenticClient {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        config.validate()?;
        let mut headers = reqwest::header::HeaderMap::new();
        let mut api_key = reqwest::header::HeaderValue::from_str(config.api_key()?)
            .map_err(|_| ConfigError::Invalid("API key contains invalid characters".into()))?;
        api_key.set_sensitive(true);
        headers.insert("x-api-key", api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute a run. Streams and collects when a stream mode is set,
    /// otherwise parses the JSON body directly.
    pub async fn execute_run(
        &self,
        query: &str,
        session_reference: &str,
        opts: &ExecuteOptions,
    ) -> Result<RunReply, ApiError> {
        if query.trim().is_empty() {
            return Err(ApiError::Validation("query cannot be empty".into()));
        }
        if session_reference.trim().is_empty() {
            return Err(ApiError::Validation(
                "session reference cannot be empty".into(),
            ));
        }

        let url = api::execute_url(
            &self.config.base_url,
            self.config.app_id()?,
            &self.config.env_name,
        );
        let user_ref = opts.user_reference.as_deref().unwrap_or(session_reference);
        let streaming = opts.stream_mode.is_some();
        let body = ExecuteBody {
            session_identity: api::build_session_identity(user_ref, Some(session_reference)),
            input: api::build_input(query),
            stream: opts.stream_mode.map(|mode| StreamConfig {
                enable: true,
                stream_mode: Some(mode),
            }),
            debug: opts.debug.then(|| DebugConfig {
                enable: true,
                debug_mode: opts.debug_mode,
            }),
            meta_data: opts.metadata.clone(),
        };

        info!(%url, streaming, "executing run");
        if let Ok(body_json) = serde_json::to_string(&body) {
            debug!(body = %body_json, "execute request body");
        }

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status().as_u16();
        match status {
            401 => Err(ApiError::Auth(
                "authentication failed, check your API key".into(),
            )),
            404 => Err(ApiError::Request(format!(
                "resource not found, check app ID '{}' and environment '{}'",
                self.config.app_id()?,
                self.config.env_name,
            ))),
            429 => Err(ApiError::Request("rate limit exceeded, retry later".into())),
            s if s >= 400 => {
                let text = resp.text().await.map_err(|e| self.request_error(e))?;
                Err(ApiError::Api {
                    status: s,
                    message: extract_error_message(&text),
                })
            }
            _ if streaming => collect_streaming_reply(resp.bytes_stream(), self).await,
            _ => {
                let text = resp.text().await.map_err(|e| self.request_error(e))?;
                debug!(status, bytes = text.len(), "execute response");
                serde_json::from_str(&text)
                    .map_err(|e| ApiError::Request(format!("failed to parse response: {e}")))
            }
        }
    }

    /// Look up the status of a run, optionally scoped to a session identity.
    pub async fn get_run_status(
        &self,
        run_id: &str,
        session_identity: Option<Vec<SessionIdentityItem>>,
    ) -> Result<StatusReply, ApiError> {
        if run_id.trim().is_empty() {
            return Err(ApiError::Validation("run ID cannot be empty".into()));
        }

        let url = api::status_url(
            &self.config.base_url,
            self.config.app_id()?,
            &self.config.env_name,
            run_id,
        );
        let body = StatusBody { session_identity };

        info!(%url, "fetching run status");
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status().as_u16();
        match status {
            401 => Err(ApiError::Auth(
                "authentication failed, check your API key".into(),
            )),
            404 => Err(ApiError::RunNotFound(run_id.to_string())),
            s if s >= 400 => {
                let text = resp.text().await.map_err(|e| self.request_error(e))?;
                Err(ApiError::Api {
                    status: s,
                    message: extract_error_message(&text),
                })
            }
            _ => {
                let text = resp.text().await.map_err(|e| self.request_error(e))?;
                debug!(status, bytes = text.len(), "status response");
                serde_json::from_str(&text)
                    .map_err(|e| ApiError::Request(format!("failed to parse response: {e}")))
            }
        }
    }

    /// Poll until the run completes, fails, or attempts run out.
    /// Sleeps `interval_secs` between attempts, but not after the last one.
    pub async fn poll_run_status(
        &self,
        run_id: &str,
        max_attempts: u32,
        interval_secs: u64,
    ) -> Result<StatusReply, ApiError> {
        debug!(run_id, max_attempts, interval_secs, "starting status poll");
        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, run_id, "poll attempt");
            let reply = self.get_run_status(run_id, None).await?;
            let raw_status = reply.status.clone().unwrap_or_default();
            match RunStatus::parse(&raw_status) {
                Some(RunStatus::Success) => return Ok(reply),
                Some(RunStatus::Failed) => {
                    let message = reply
                        .error
                        .as_ref()
                        .and_then(|e| e.message.clone())
                        .unwrap_or_else(|| "run failed".into());
                    return Err(ApiError::RunFailed(message));
                }
                Some(RunStatus::Pending | RunStatus::Running) => {
                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
                    }
                }
                None => return Err(ApiError::UnknownStatus(raw_status)),
            }
        }
        Err(ApiError::PollTimeout(u64::from(max_attempts) * interval_secs))
    }

    fn request_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.config.timeout_secs)
        } else {
            ApiError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl StatusFetcher for AgenticClient {
    async fn fetch_status(
        &self,
        run_id: &str,
        session_identity: Option<Vec<SessionIdentityItem>>,
    ) -> Result<StatusReply, ApiError> {
        self.get_run_status(run_id, session_identity).await
    }
}

fn extract_error_message(body: &str) -> String {
    if body.is_empty() {
        return "unknown error".into();
    }
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
