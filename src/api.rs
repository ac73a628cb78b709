//! Wire-level reference for the Agentic App Platform REST API: endpoint
//! builders, request body shapes, and the enums the platform validates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ContentItem;

/// Default base URL for the platform API.
pub const BASE_URL: &str = "https://agent-platform.kore.ai/api/v2";

/// Streaming mode for the execute endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    Tokens,
    Messages,
    Custom,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Tokens => "tokens",
            StreamMode::Messages => "messages",
            StreamMode::Custom => "custom",
        }
    }
}

/// Debug mode for the execute endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DebugMode {
    All,
    FunctionCall,
    Thoughts,
}

impl DebugMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebugMode::All => "all",
            DebugMode::FunctionCall => "function-call",
            DebugMode::Thoughts => "thoughts",
        }
    }
}

/// Lifecycle states the status endpoint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// One entry of the `sessionIdentity` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentityItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl SessionIdentityItem {
    pub fn user_reference(value: impl Into<String>) -> Self {
        Self {
            kind: "userReference".into(),
            value: value.into(),
        }
    }

    pub fn session_reference(value: impl Into<String>) -> Self {
        Self {
            kind: "sessionReference".into(),
            value: value.into(),
        }
    }
}

/// Identity array for a run: user reference first, session reference second.
pub fn build_session_identity(
    user_ref: &str,
    session_ref: Option<&str>,
) -> Vec<SessionIdentityItem> {
    let mut identity = vec![SessionIdentityItem::user_reference(user_ref)];
    if let Some(session_ref) = session_ref {
        identity.push(SessionIdentityItem::session_reference(session_ref));
    }
    identity
}

/// Input array for a run: a single text item.
pub fn build_input(text: &str) -> Vec<ContentItem> {
    vec![ContentItem::text(text)]
}

pub fn execute_url(base_url: &str, app_id: &str, env_name: &str) -> String {
    format!("{base_url}/apps/{app_id}/environments/{env_name}/runs/execute")
}

pub fn status_url(base_url: &str, app_id: &str, env_name: &str, run_id: &str) -> String {
    format!("{base_url}/apps/{app_id}/environments/{env_name}/runs/{run_id}/status")
}

/// Body for `POST .../runs/execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteBody {
    #[serde(rename = "sessionIdentity")]
    pub session_identity: Vec<SessionIdentityItem>,
    pub input: Vec<ContentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugConfig>,
    #[serde(rename = "metaData", skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamConfig {
    pub enable: bool,
    #[serde(rename = "streamMode", skip_serializing_if = "Option::is_none")]
    pub stream_mode: Option<StreamMode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugConfig {
    pub enable: bool,
    #[serde(rename = "debugMode", skip_serializing_if = "Option::is_none")]
    pub debug_mode: Option<DebugMode>,
}

/// Body for `POST .../runs/{runId}/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusBody {
    #[serde(rename = "sessionIdentity", skip_serializing_if = "Option::is_none")]
    pub session_identity: Option<Vec<SessionIdentityItem>>,
}
