//! Named provider profiles persisted in the key-value store.
//!
//! Layout: `apiProfiles` holds a JSON array of [`ApiProfile`],
//! `activeApiProfileId` the id of the active one. Before profiles existed the
//! provider tuple lived in four loose keys; [`ProfileStore::init`] folds those
//! into a "Default" profile.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use focusmate_core::{
    AiService, CompanionError, KeyValueStore, ProviderConfig, ProviderSource,
};

pub const PROFILES_KEY: &str = "apiProfiles";
pub const ACTIVE_PROFILE_KEY: &str = "activeApiProfileId";

const LEGACY_API_KEY: &str = "apiKey";
const LEGACY_SERVICE: &str = "aiService";
const LEGACY_URL: &str = "apiUrl";
const LEGACY_MODEL: &str = "apiModel";
const LEGACY_DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub is_active: bool,
    /// Unix millis.
    #[serde(default)]
    pub created_at: i64,
}

impl ApiProfile {
    pub fn new(name: impl Into<String>, provider: ProviderConfig) -> Self {
        Self {
            id: new_profile_id(),
            name: name.into(),
            provider,
            is_active: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

pub fn new_profile_id() -> String {
    format!("api_{}", uuid::Uuid::new_v4().simple())
}

pub struct ProfileStore {
    storage: Arc<dyn KeyValueStore>,
}

impl ProfileStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Migrate legacy keys when no profiles exist yet, then make sure some
    /// profile is active. Returns the resulting list.
    pub fn init(&self) -> Result<Vec<ApiProfile>> {
        let mut profiles = self.list()?;

        if profiles.is_empty() {
            if let Some(profile) = self.legacy_profile()? {
                info!(profile = %profile.id, service = %profile.provider.service, "Migrated legacy API settings");
                profiles.push(profile);
                self.write(&profiles)?;
                self.set_active(&profiles[0].id)?;
            }
        }

        if self.active_id()?.is_none() {
            if let Some(first) = profiles.first() {
                let id = first.id.clone();
                self.set_active(&id)?;
            }
        }

        self.list()
    }

    fn legacy_profile(&self) -> Result<Option<ApiProfile>> {
        let api_key = match self.storage.get(LEGACY_API_KEY)? {
            Some(key) if !key.is_empty() => key,
            _ => return Ok(None),
        };
        let service = self
            .storage
            .get(LEGACY_SERVICE)?
            .map(|s| AiService::from_id(&s))
            .unwrap_or_default();
        let url = self.storage.get(LEGACY_URL)?.unwrap_or_default();
        let model = self
            .storage
            .get(LEGACY_MODEL)?
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| LEGACY_DEFAULT_MODEL.to_string());

        let mut profile = ApiProfile::new(
            "Default",
            ProviderConfig::new(service, api_key)
                .with_url(url)
                .with_model(model),
        );
        profile.is_active = true;
        Ok(Some(profile))
    }

    /// All profiles. Unreadable data yields an empty list.
    pub fn list(&self) -> Result<Vec<ApiProfile>> {
        let Some(raw) = self.storage.get(PROFILES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(profiles) => Ok(profiles),
            Err(e) => {
                warn!(error = %e, "Stored API profiles are unreadable; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, profiles: &[ApiProfile]) -> Result<()> {
        let raw = serde_json::to_string(profiles).context("Failed to serialize API profiles")?;
        self.storage.set(PROFILES_KEY, &raw)
    }

    pub fn active_id(&self) -> Result<Option<String>> {
        Ok(self.storage.get(ACTIVE_PROFILE_KEY)?.filter(|id| !id.is_empty()))
    }

    /// Insert, or replace the profile with the same id. A blank id gets a
    /// fresh one.
    pub fn save(&self, mut profile: ApiProfile) -> Result<ApiProfile> {
        if profile.id.trim().is_empty() {
            profile.id = new_profile_id();
        }
        if profile.created_at == 0 {
            profile.created_at = chrono::Utc::now().timestamp_millis();
        }
        profile.is_active = self.active_id()?.as_deref() == Some(profile.id.as_str());

        let mut profiles = self.list()?;
        match profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }
        self.write(&profiles)?;
        info!(profile = %profile.id, service = %profile.provider.service, "Saved API profile");
        Ok(profile)
    }

    /// Remove a profile. Deleting the active one re-points the active id at
    /// the first remaining profile, or clears it.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut profiles = self.list()?;
        let before = profiles.len();
        profiles.retain(|p| p.id != id);
        if profiles.len() == before {
            return Ok(false);
        }
        self.write(&profiles)?;

        if self.active_id()?.as_deref() == Some(id) {
            match profiles.first() {
                Some(next) => {
                    let next = next.id.clone();
                    self.set_active(&next)?;
                }
                None => self.storage.remove(ACTIVE_PROFILE_KEY)?,
            }
        }
        info!(profile = %id, "Deleted API profile");
        Ok(true)
    }

    /// Mark `id` active and refresh every profile's `is_active` flag.
    pub fn set_active(&self, id: &str) -> Result<()> {
        self.storage.set(ACTIVE_PROFILE_KEY, id)?;
        let mut profiles = self.list()?;
        for profile in &mut profiles {
            profile.is_active = profile.id == id;
        }
        self.write(&profiles)
    }

    /// The active profile, falling back to the first one.
    pub fn active(&self) -> Result<Option<ApiProfile>> {
        let profiles = self.list()?;
        let active_id = self.active_id()?;
        let found = active_id
            .as_deref()
            .and_then(|id| profiles.iter().find(|p| p.id == id))
            .cloned();
        Ok(found.or_else(|| profiles.into_iter().next()))
    }
}

impl ProviderSource for ProfileStore {
    fn active_provider(&self) -> Result<ProviderConfig, CompanionError> {
        let profile = self
            .active()
            .map_err(|e| CompanionError::Storage(e.to_string()))?
            .ok_or_else(|| CompanionError::Validation("no API profile configured".into()))?;
        let mut provider = profile.provider;
        provider.api_url = provider.resolved_url().to_string();
        Ok(provider)
    }
}
