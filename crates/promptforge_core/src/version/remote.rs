//! HTTP client for the hosted version service.
//!
//! The service owns storage for signed-in accounts: it assigns ids and
//! timestamps and is the sole authoritative enforcer of the 20-version cap.
//! Every non-2xx response is normalized into
//! [`PromptforgeError::Remote`] with a message extracted from the body's
//! `error` or `detail` field, falling back to `HTTP <status>` when the body
//! is unparseable.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{PromptforgeError, Result};

use super::{REMOTE_VERSION_CAP, Version, VersionBackend, VersionDraft, VersionKind};

/// Version record as the service returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Server-issued identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// The versioned prompt text.
    pub content: String,
    /// Manual save or regeneration.
    #[serde(rename = "type")]
    pub kind: VersionKind,
    /// Display label.
    #[serde(default)]
    pub version_number: String,
    /// Optional user-supplied note.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional topic label.
    #[serde(default)]
    pub topic: Option<String>,
    /// Framework that produced the prompt, if any.
    #[serde(default)]
    pub framework_id: Option<String>,
    /// Display name of that framework.
    #[serde(default)]
    pub framework_name: Option<String>,
    /// The raw requirement the prompt was generated from.
    #[serde(default)]
    pub original_input: Option<String>,
    /// Server-stamped creation timestamp, RFC 3339.
    pub created_at: String,
}

impl From<VersionRecord> for Version {
    fn from(record: VersionRecord) -> Self {
        Version {
            id: record.id,
            content: record.content,
            kind: record.kind,
            version_number: record.version_number,
            description: record.description,
            topic: record.topic,
            framework_id: record.framework_id,
            framework_name: record.framework_name,
            original_input: record.original_input,
            created_at: record.created_at,
            user_id: Some(record.user_id),
        }
    }
}

#[derive(Serialize)]
struct SaveVersionRequest<'a> {
    user_id: &'a str,
    content: &'a str,
    #[serde(rename = "type")]
    kind: VersionKind,
    version_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    framework_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    framework_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_input: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Normalize a non-2xx response into an error carrying the HTTP status and
/// the best message the body offers. An over-quota rejection (409) maps to
/// the distinct quota error so the UI can word it actionably.
fn normalize_error(status: StatusCode, body: &str) -> PromptforgeError {
    if status == StatusCode::CONFLICT {
        return PromptforgeError::QuotaExceeded {
            limit: REMOTE_VERSION_CAP,
        };
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.detail))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    PromptforgeError::Remote {
        status: status.as_u16(),
        message,
    }
}

/// Thin, user-scoped CRUD client for the version service.
#[derive(Debug, Clone)]
pub struct RemoteVersionClient {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteVersionClient {
    /// Client against the given service base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(normalize_error(status, &body));
        }
        Ok(resp.json().await?)
    }

    /// Fetch up to `limit` versions for a user, newest first by server
    /// contract.
    pub async fn list(&self, user_id: &str, limit: usize) -> Result<Vec<VersionRecord>> {
        let url = format!("{}/versions", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("user_id", user_id), ("limit", &limit.to_string())])
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Submit a draft for creation. The server assigns id and timestamp and
    /// rejects the save when the account is at capacity.
    pub async fn save(&self, user_id: &str, draft: &VersionDraft) -> Result<VersionRecord> {
        let url = format!("{}/versions", self.base_url);
        let body = SaveVersionRequest {
            user_id,
            content: &draft.content,
            kind: draft.kind,
            version_number: &draft.version_number,
            description: draft.description.as_deref(),
            topic: draft.topic.as_deref(),
            framework_id: draft.framework_id.as_deref(),
            framework_name: draft.framework_name.as_deref(),
            original_input: draft.original_input.as_deref(),
        };
        let resp = self.http.post(&url).json(&body).send().await?;
        Self::decode(resp).await
    }

    /// Fetch one version by global id. The service does not scope this read
    /// by user; preserved as consumed.
    pub async fn get(&self, version_id: &str) -> Result<VersionRecord> {
        let url = format!("{}/versions/{}", self.base_url, version_id);
        let resp = self.http.get(&url).send().await?;
        Self::decode(resp).await
    }

    /// Delete one version. Deleting an id the service does not know
    /// surfaces its not-found error.
    pub async fn delete(&self, version_id: &str, user_id: &str) -> Result<()> {
        let url = format!("{}/versions/{}", self.base_url, version_id);
        let resp = self
            .http
            .delete(&url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(normalize_error(status, &body));
        }
        Ok(())
    }

    /// Restore the identified version as current; returns the re-stamped
    /// version the server created for it.
    pub async fn rollback(&self, version_id: &str, user_id: &str) -> Result<VersionRecord> {
        let url = format!("{}/versions/{}/rollback", self.base_url, version_id);
        let resp = self
            .http
            .post(&url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        Self::decode(resp).await
    }
}

/// [`VersionBackend`] over the hosted service, bound to one user.
///
/// Built from a non-optional user id, so an empty-string id can never be
/// mistaken for anonymous mode.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: RemoteVersionClient,
    user_id: String,
}

impl RemoteBackend {
    /// Backend for the given user against the given client.
    pub fn new(client: RemoteVersionClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    /// Ask the server to restore a version as current.
    pub async fn rollback(&self, version_id: &str) -> Result<Version> {
        let record = self.client.rollback(version_id, &self.user_id).await?;
        Ok(record.into())
    }
}

#[async_trait]
impl VersionBackend for RemoteBackend {
    fn capacity(&self) -> Option<usize> {
        Some(REMOTE_VERSION_CAP)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Version>> {
        let records = self.client.list(&self.user_id, limit).await?;
        Ok(records.into_iter().map(Version::from).collect())
    }

    async fn save(&self, draft: VersionDraft) -> Result<Version> {
        let record = self.client.save(&self.user_id, &draft).await?;
        Ok(record.into())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(id, &self.user_id).await
    }

    async fn get(&self, id: &str) -> Result<Option<Version>> {
        match self.client.get(id).await {
            Ok(record) => Ok(Some(record.into())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
