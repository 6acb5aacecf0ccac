//! One-time onboarding record: who the assistant is set up for.
//!
//! Saved next to the config file on first start and read once at startup to
//! decide whether the welcome form is shown.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ValidationError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompanyProfile {
    pub name: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}

impl CompanyProfile {
    pub fn new(name: &str, purpose: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        let purpose = purpose.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("company name"));
        }
        if purpose.is_empty() {
            return Err(ValidationError::MissingField("company purpose"));
        }
        Ok(Self {
            name: name.to_string(),
            purpose: purpose.to_string(),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store in the default config directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Config::config_dir()?.join("profile.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` means onboarding has not happened yet.
    pub fn load(&self) -> Result<Option<CompanyProfile>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let profile = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Invalid profile file {:?}: {}", self.path, e))?;
        Ok(Some(profile))
    }

    pub fn save(&self, profile: &CompanyProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(profile)?)?;
        tracing::info!(path = ?self.path, "onboarding profile saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_requires_both_fields() {
        assert_eq!(
            CompanyProfile::new("  ", "Insurance"),
            Err(ValidationError::MissingField("company name"))
        );
        assert_eq!(
            CompanyProfile::new("Acme", ""),
            Err(ValidationError::MissingField("company purpose"))
        );
        let profile = CompanyProfile::new(" Acme ", " Home insurance ").unwrap();
        assert_eq!(profile.name, "Acme");
        assert_eq!(profile.purpose, "Home insurance");
    }

    #[test]
    fn test_missing_profile_means_not_onboarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profile.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_profile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("ragchat").join("profile.json"));
        let profile = CompanyProfile::new("Acme", "Home insurance").unwrap();
        store.save(&profile).unwrap();
        assert_eq!(store.load().unwrap(), Some(profile));
    }
}
