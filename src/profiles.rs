//! Named connection profiles, stored as JSON under `~/.kore`.
//!
//! `~/.kore/profiles` maps profile names to credentials; `~/.kore/config`
//! holds the default-profile marker. Files are written owner-only via a
//! temp file and rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::ConfigError;

pub const PROFILE_DIR_NAME: &str = ".kore";

/// One stored connection profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub api_key: String,
    pub app_id: String,
    pub env_name: String,
    pub base_url: String,
    pub timeout: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_profile: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// First 8 characters of a key, the rest replaced with `****`.
pub fn mask_api_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        return "****".into();
    }
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}****")
}

pub struct ProfileStore {
    dir: PathBuf,
    profiles_file: PathBuf,
    config_file: PathBuf,
}

impl ProfileStore {
    /// Store under `~/.kore`.
    pub fn open_default() -> Result<Self, ConfigError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ConfigError::Store("could not determine home directory".into()))?;
        Ok(Self::at(home.join(PROFILE_DIR_NAME)))
    }

    /// Store under an explicit directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            profiles_file: dir.join("profiles"),
            config_file: dir.join("config"),
            dir,
        }
    }

    pub async fn load(&self) -> Result<BTreeMap<String, Profile>, ConfigError> {
        match tokio::fs::read_to_string(&self.profiles_file).await {
            Ok(json) => serde_json::from_str(&json).map_err(|e| {
                ConfigError::Store(format!(
                    "corrupted profiles file at {}: {e}",
                    self.profiles_file.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no profiles file, starting empty");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(ConfigError::Store(format!("failed to load profiles: {e}"))),
        }
    }

    /// Add or update a profile. Updates keep the original creation time.
    pub async fn add(&self, name: &str, mut profile: Profile) -> Result<(), ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid("profile name cannot be empty".into()));
        }
        let mut profiles = self.load().await?;
        if let Some(existing) = profiles.get(name) {
            warn!(name, "overwriting existing profile");
            profile.created_at = existing.created_at;
        }
        profile.updated_at = Utc::now();
        profiles.insert(name.to_string(), profile);
        self.save(&profiles).await?;
        info!(name, count = profiles.len(), "saved profile");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Profile, ConfigError> {
        let profiles = self.load().await?;
        profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found(name, &profiles))
    }

    /// Profile names, sorted.
    pub async fn names(&self) -> Result<Vec<String>, ConfigError> {
        Ok(self.load().await?.into_keys().collect())
    }

    pub async fn delete(&self, name: &str) -> Result<(), ConfigError> {
        let mut profiles = self.load().await?;
        if profiles.remove(name).is_none() {
            return Err(Self::not_found(name, &profiles));
        }
        self.save(&profiles).await?;
        if self.default_profile().await?.as_deref() == Some(name) {
            warn!(name, "deleted the default profile, clearing default");
            self.clear_default().await?;
        }
        info!(name, "deleted profile");
        Ok(())
    }

    pub async fn set_default(&self, name: &str) -> Result<(), ConfigError> {
        // Errors if the profile does not exist.
        self.get(name).await?;
        let mut settings = self.settings().await;
        settings.default_profile = Some(name.to_string());
        self.write_settings(&settings).await?;
        info!(name, "set default profile");
        Ok(())
    }

    pub async fn default_profile(&self) -> Result<Option<String>, ConfigError> {
        Ok(self.settings().await.default_profile)
    }

    pub async fn clear_default(&self) -> Result<(), ConfigError> {
        let mut settings = self.settings().await;
        if settings.default_profile.take().is_some() {
            self.write_settings(&settings).await?;
        }
        Ok(())
    }

    async fn settings(&self) -> StoreSettings {
        match tokio::fs::read_to_string(&self.config_file).await {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(error = %e, "corrupted store config, ignoring");
                StoreSettings::default()
            }),
            Err(_) => StoreSettings::default(),
        }
    }

    async fn write_settings(&self, settings: &StoreSettings) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| ConfigError::Store(e.to_string()))?;
        self.write_secure(&self.config_file, json).await
    }

    async fn save(&self, profiles: &BTreeMap<String, Profile>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(profiles)
            .map_err(|e| ConfigError::Store(e.to_string()))?;
        self.write_secure(&self.profiles_file, json).await
    }

    async fn ensure_dir(&self) -> Result<(), ConfigError> {
        if !self.dir.exists() {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| ConfigError::Store(format!("failed to create {}: {e}", self.dir.display())))?;
            info!(dir = %self.dir.display(), "created profile directory");
        }
        set_mode(&self.dir, 0o700).await;
        Ok(())
    }

    async fn write_secure(&self, path: &Path, contents: String) -> Result<(), ConfigError> {
        self.ensure_dir().await?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| ConfigError::Store(format!("failed to write {}: {e}", tmp.display())))?;
        set_mode(&tmp, 0o600).await;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| ConfigError::Store(format!("failed to replace {}: {e}", path.display())))?;
        Ok(())
    }

    fn not_found(name: &str, profiles: &BTreeMap<String, Profile>) -> ConfigError {
        let available = if profiles.is_empty() {
            "none".to_string()
        } else {
            profiles.keys().cloned().collect::<Vec<_>>().join(", ")
        };
        ConfigError::ProfileNotFound {
            name: name.to_string(),
            available,
        }
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await {
        warn!(path = %path.display(), error = %e, "failed to set permissions");
    }
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(env_name: &str) -> Profile {
        Profile {
            api_key: "kg-12345678-abcd-efgh".into(),
            app_id: "aa-12345678-abcd".into(),
            env_name: env_name.into(),
            base_url: crate::api::BASE_URL.into(),
            timeout: 30,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn add_and_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        store.add("prod", sample("production")).await.unwrap();

        let profile = store.get("prod").await.unwrap();
        assert_eq!(profile.env_name, "production");
        assert_eq!(profile.app_id, "aa-12345678-abcd");
    }

    #[tokio::test]
    async fn names_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        store.add("staging", sample("staging")).await.unwrap();
        store.add("dev", sample("dev")).await.unwrap();
        store.add("prod", sample("production")).await.unwrap();

        assert_eq!(store.names().await.unwrap(), vec!["dev", "prod", "staging"]);
    }

    #[tokio::test]
    async fn missing_profile_lists_available() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        store.add("prod", sample("production")).await.unwrap();

        let err = store.get("qa").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'qa'"));
        assert!(message.contains("prod"));
    }

    #[tokio::test]
    async fn empty_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        assert!(store.add("   ", sample("production")).await.is_err());
    }

    #[tokio::test]
    async fn overwrite_preserves_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        store.add("prod", sample("production")).await.unwrap();
        let first = store.get("prod").await.unwrap();

        store.add("prod", sample("production-v2")).await.unwrap();
        let second = store.get("prod").await.unwrap();
        assert_eq!(second.env_name, "production-v2");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn default_profile_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        store.add("prod", sample("production")).await.unwrap();

        assert_eq!(store.default_profile().await.unwrap(), None);
        store.set_default("prod").await.unwrap();
        assert_eq!(store.default_profile().await.unwrap().as_deref(), Some("prod"));

        store.clear_default().await.unwrap();
        assert_eq!(store.default_profile().await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_default_requires_existing_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        assert!(store.set_default("ghost").await.is_err());
    }

    #[tokio::test]
    async fn deleting_default_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::at(dir.path().join(".kore"));
        store.add("prod", sample("production")).await.unwrap();
        store.set_default("prod").await.unwrap();

        store.delete("prod").await.unwrap();
        assert_eq!(store.default_profile().await.unwrap(), None);
        assert!(store.get("prod").await.is_err());
    }

    #[tokio::test]
    async fn corrupted_profiles_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let kore = dir.path().join(".kore");
        tokio::fs::create_dir_all(&kore).await.unwrap();
        tokio::fs::write(kore.join("profiles"), "{not json")
            .await
            .unwrap();

        let store = ProfileStore::at(&kore);
        let err = store.load().await.unwrap_err();
        assert!(err.to_string().contains("corrupted profiles file"));
        assert!(err.to_string().contains("profiles"));
    }

    #[test]
    fn mask_keeps_eight_chars() {
        assert_eq!(mask_api_key("kg-12345678-abcd"), "kg-12345****");
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key(""), "****");
    }
}
