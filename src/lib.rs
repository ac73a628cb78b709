//! Client library for the Kore.ai Agentic App Platform: execute agentic
//! runs, collect status-streaming responses, poll run status, and manage
//! local connection profiles. The `agentic-cli` binary is a thin layer over
//! these modules.

pub mod api;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod profiles;
pub mod stream;
pub mod types;

pub use api::{DebugMode, RunStatus, SessionIdentityItem, StreamMode, BASE_URL};
pub use client::{AgenticClient, ExecuteOptions};
pub use config::Config;
pub use error::{ApiError, ConfigError};
pub use profiles::{Profile, ProfileStore};
pub use stream::{collect_streaming_reply, StatusFetcher, StreamCollector};
pub use types::{ContentItem, RawEvent, RunReply, SessionInfo, StatusReply};
