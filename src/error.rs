#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("run '{0}' not found")]
    RunNotFound(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("run did not complete after {0}s")]
    PollTimeout(u64),
    #[error("run failed: {0}")]
    RunFailed(String),
    #[error("unknown run status: {0}")]
    UnknownStatus(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("failed to process streaming response: {0}")]
    StreamProcessing(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("API key not configured. Set KOREAI_API_KEY or use --api-key")]
    MissingApiKey,
    #[error("app ID not configured. Set KOREAI_APP_ID or use --app-id")]
    MissingAppId,
    #[error("profile '{name}' not found. Available profiles: {available}")]
    ProfileNotFound { name: String, available: String },
    #[error("profile store error: {0}")]
    Store(String),
    #[error("invalid value: {0}")]
    Invalid(String),
}
