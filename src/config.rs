//! Runtime configuration. Values are resolved in precedence order:
//! command-line flags, then environment variables, then the selected
//! profile, then built-in defaults.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::api::BASE_URL;
use crate::error::ConfigError;
use crate::profiles::{mask_api_key, Profile};

pub const DEFAULT_ENV_NAME: &str = "production";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub app_id: Option<String>,
    pub env_name: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            app_id: None,
            env_name: DEFAULT_ENV_NAME.into(),
            base_url: BASE_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Load `.env` into the process environment: the given file, or `./.env`
/// when present. A missing `./.env` is not an error; a named file that
/// cannot be read is.
pub fn load_env_file(env_file: Option<&Path>) -> Result<(), ConfigError> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                ConfigError::Invalid(format!("failed to load {}: {e}", path.display()))
            })?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}

impl Config {
    /// Read the `KOREAI_*` environment variables over the current values.
    pub fn overlay_env(&mut self) -> Result<(), ConfigError> {
        self.overlay_from(|key| std::env::var(key).ok())
    }

    /// Fill unset credentials and override defaults from a stored profile.
    /// Environment and flag values applied afterwards win.
    pub fn apply_profile(&mut self, profile: &Profile) {
        debug!(env_name = %profile.env_name, "applying profile values");
        if self.api_key.is_none() {
            self.api_key = Some(profile.api_key.clone());
        }
        if self.app_id.is_none() {
            self.app_id = Some(profile.app_id.clone());
        }
        self.env_name = profile.env_name.clone();
        self.base_url = profile.base_url.clone();
        self.timeout_secs = profile.timeout;
    }

    /// Overlay values from an environment-like lookup. Split out from
    /// [`Config::overlay_env`] so tests can inject a map instead of
    /// mutating process state.
    pub fn overlay_from<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = get("KOREAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(app_id) = get("KOREAI_APP_ID") {
            self.app_id = Some(app_id);
        }
        if let Some(env_name) = get("KOREAI_ENV_NAME") {
            self.env_name = env_name;
        }
        if let Some(base_url) = get("KOREAI_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(timeout) = get("KOREAI_TIMEOUT") {
            self.timeout_secs = timeout
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("KOREAI_TIMEOUT: '{timeout}' is not a number")))?;
        }
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    pub fn app_id(&self) -> Result<&str, ConfigError> {
        self.app_id.as_deref().ok_or(ConfigError::MissingAppId)
    }

    /// Check that everything a client needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_key()?;
        self.app_id()?;
        Ok(())
    }

    pub fn masked_api_key(&self) -> String {
        match &self.api_key {
            Some(key) => mask_api_key(key),
            None => "Not set".into(),
        }
    }
}

// Masks the API key; safe to log.
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config(api_key='{}', app_id='{}', env_name='{}', base_url='{}', timeout={}s)",
            self.masked_api_key(),
            self.app_id.as_deref().unwrap_or("Not set"),
            self.env_name,
            self.base_url,
            self.timeout_secs,
        )
    }
}
