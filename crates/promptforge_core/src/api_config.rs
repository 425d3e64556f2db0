//! Per-provider API key configuration.
//!
//! At most one configuration exists per provider; saving replaces any
//! previous record for that provider atomically. Key material arrives
//! already encrypted - encryption and decryption are the caller's concern,
//! this repository only stores and returns the opaque string.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Collection, LocalDatabase};
use crate::error::Result;

/// A stored provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Synthetic record id.
    pub id: String,
    /// Provider name, e.g. "deepseek", "gemini", "openai".
    pub provider: String,
    /// Encrypted API key, opaque to this crate.
    pub api_key: String,
    /// Whether this configuration is in use.
    pub is_active: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last replacement.
    pub updated_at: String,
}

/// CRUD over provider configurations in the embedded database.
#[derive(Debug, Clone)]
pub struct ApiConfigRepo {
    db: Arc<LocalDatabase>,
}

impl ApiConfigRepo {
    /// Repository over the given database handle.
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self { db }
    }

    /// Store a configuration for a provider, replacing any existing one.
    /// The delete-old/insert-new pair commits atomically.
    pub fn save(&self, provider: &str, encrypted_api_key: &str) -> Result<()> {
        let existing = self.find(provider)?;
        let now = Utc::now().to_rfc3339();

        let config = ApiConfig {
            id: Uuid::new_v4().to_string(),
            provider: provider.to_string(),
            api_key: encrypted_api_key.to_string(),
            is_active: true,
            created_at: existing
                .as_ref()
                .map(|c| c.created_at.clone())
                .unwrap_or_else(|| now.clone()),
            updated_at: now,
        };

        self.db.replace(
            Collection::ApiConfigs,
            existing.as_ref().map(|c| c.id.as_str()),
            &config.id,
            &serde_json::to_value(&config)?,
        )?;
        log::debug!("saved api config for provider {provider}");
        Ok(())
    }

    /// The stored (still encrypted) key for a provider, if configured.
    pub fn get(&self, provider: &str) -> Result<Option<String>> {
        Ok(self.find(provider)?.map(|c| c.api_key))
    }

    /// Every stored configuration.
    pub fn get_all(&self) -> Result<Vec<ApiConfig>> {
        self.db
            .get_all(Collection::ApiConfigs)?
            .into_iter()
            .map(|record| serde_json::from_value(record).map_err(Into::into))
            .collect()
    }

    /// Remove the configuration for a provider; a missing provider is a
    /// successful no-op.
    pub fn delete(&self, provider: &str) -> Result<()> {
        if let Some(config) = self.find(provider)? {
            self.db.delete(Collection::ApiConfigs, &config.id)?;
        }
        Ok(())
    }

    /// Whether a provider has a configuration with a non-empty key.
    pub fn has(&self, provider: &str) -> Result<bool> {
        Ok(self.get(provider)?.is_some_and(|key| !key.is_empty()))
    }

    fn find(&self, provider: &str) -> Result<Option<ApiConfig>> {
        match self
            .db
            .get_by_index(Collection::ApiConfigs, "provider", provider)?
        {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }
}
