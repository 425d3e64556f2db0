//! Version model and storage backends.
//!
//! A [`Version`] is an immutable-once-created snapshot of prompt text plus
//! provenance metadata. Exactly one backend holds the authoritative copy of
//! a given version: the embedded database for anonymous use, the hosted
//! version service for signed-in accounts. The [`VersionBackend`] trait is
//! the seam between the two; the workspace store is built over it and never
//! branches on user identity itself.

mod local;
mod remote;

pub use local::{LocalBackend, LocalVersionRepo};
pub use remote::{RemoteBackend, RemoteVersionClient, VersionRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Version ceiling enforced for remote-backed accounts. Local storage is
/// unbounded; any cap there is a UI concern.
pub const REMOTE_VERSION_CAP: usize = 20;

/// How a version came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionKind {
    /// User-initiated manual save.
    #[default]
    Save,
    /// System-initiated regeneration result.
    Optimize,
}

impl std::fmt::Display for VersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionKind::Save => write!(f, "save"),
            VersionKind::Optimize => write!(f, "optimize"),
        }
    }
}

/// Canonical version record, unified across both backends.
///
/// `created_at` is an RFC 3339 timestamp stamped by whichever backend
/// performed the write (local: client clock, remote: server clock). It is
/// the sole recency sort key but is not comparable across backends to
/// sub-second precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Opaque identifier. Local ids carry a `local-` prefix so they can
    /// never collide with server-issued ids after a later login.
    pub id: String,
    /// The versioned prompt text.
    pub content: String,
    /// Manual save or regeneration.
    #[serde(rename = "type")]
    pub kind: VersionKind,
    /// Display label; not semantically ordered beyond display.
    pub version_number: String,
    /// Optional user-supplied note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional topic label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Framework that produced the prompt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_id: Option<String>,
    /// Display name of that framework.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_name: Option<String>,
    /// The raw requirement the prompt was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_input: Option<String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Owning user; present only for remotely-stored versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Caller-supplied fields for a save; the backend assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionDraft {
    /// The prompt text to snapshot. Must be non-empty at save time.
    pub content: String,
    /// Manual save or regeneration.
    pub kind: VersionKind,
    /// Display label.
    pub version_number: String,
    /// Optional user-supplied note.
    pub description: Option<String>,
    /// Optional topic label.
    pub topic: Option<String>,
    /// Framework that produced the prompt, if any.
    pub framework_id: Option<String>,
    /// Display name of that framework.
    pub framework_name: Option<String>,
    /// The raw requirement the prompt was generated from.
    pub original_input: Option<String>,
}

impl VersionDraft {
    /// Draft with the required fields; provenance metadata defaults to none.
    pub fn new(content: impl Into<String>, kind: VersionKind, version_number: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind,
            version_number: version_number.into(),
            ..Default::default()
        }
    }
}

/// Millisecond recency of a version; unparseable timestamps sort last.
pub(crate) fn recency_millis(version: &Version) -> i64 {
    DateTime::parse_from_rfc3339(&version.created_at)
        .map(|t| t.timestamp_millis())
        .unwrap_or(i64::MIN)
}

/// Sort versions newest-first by `created_at`. The sort is stable, so
/// same-timestamp entries keep their existing order.
pub(crate) fn sort_recent(versions: &mut [Version]) {
    versions.sort_by_key(|v| std::cmp::Reverse(recency_millis(v)));
}

/// Synthesize a client-side version id: time-based with a random suffix,
/// namespaced away from server-issued ids.
pub(crate) fn local_version_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "local-{}-{}",
        Utc::now().timestamp_millis(),
        &suffix[..9]
    )
}

/// Storage strategy for version records.
///
/// Implementations are selected once per workspace store, replacing the
/// original design's routing on presence of a user id argument (which
/// silently treated an empty-string id as anonymous).
#[async_trait]
pub trait VersionBackend: Send + Sync {
    /// Hard capacity of this backend, if it has one.
    fn capacity(&self) -> Option<usize> {
        None
    }

    /// Fetch up to `limit` versions, newest first. Backends without a
    /// capacity may ignore the limit and return the full history.
    async fn list(&self, limit: usize) -> Result<Vec<Version>>;

    /// Persist a draft and return the stored version with its assigned id
    /// and timestamp.
    async fn save(&self, draft: VersionDraft) -> Result<Version>;

    /// Delete by id. Local deletion is idempotent; the remote service
    /// surfaces its not-found error. The asymmetry is part of the contract.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Fetch one version by id. Absence is `None`.
    async fn get(&self, id: &str) -> Result<Option<Version>>;
}
