//! Local version storage for anonymous use.
//!
//! [`LocalVersionRepo`] holds version records in the embedded database with
//! no user scoping and no capacity cap. History here is best-effort: list
//! reads degrade to an empty result instead of failing, because an
//! anonymous user losing a banner is better than an error page.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::{Collection, LocalDatabase};
use crate::error::Result;

use super::{Version, VersionBackend, VersionDraft, local_version_id, sort_recent};

/// CRUD over version records in the embedded database.
#[derive(Debug, Clone)]
pub struct LocalVersionRepo {
    db: Arc<LocalDatabase>,
}

impl LocalVersionRepo {
    /// Repository over the given database handle.
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self { db }
    }

    /// Upsert a fully-formed version (id and timestamp already assigned).
    pub fn save(&self, version: &Version) -> Result<()> {
        let record = serde_json::to_value(version)?;
        self.db.put(Collection::Versions, &version.id, &record)?;
        log::debug!("saved local version {}", version.id);
        Ok(())
    }

    /// Every stored version, newest first.
    ///
    /// Read failures degrade to an empty list; they are logged, not
    /// surfaced. Local history is best-effort by contract.
    pub fn list_all(&self) -> Vec<Version> {
        let records = match self.db.get_all(Collection::Versions) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("failed to read local versions: {e}");
                return Vec::new();
            }
        };

        let mut versions: Vec<Version> = records
            .into_iter()
            .filter_map(|r| match serde_json::from_value(r) {
                Ok(v) => Some(v),
                Err(e) => {
                    log::warn!("skipping undecodable local version record: {e}");
                    None
                }
            })
            .collect();

        sort_recent(&mut versions);
        versions
    }

    /// Point lookup. Absence is `None`, never an error.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Version>> {
        match self.db.get(Collection::Versions, id)? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    /// Idempotent delete; removing a missing id succeeds. Returns whether a
    /// record existed.
    pub fn delete_by_id(&self, id: &str) -> Result<bool> {
        let existed = self.db.delete(Collection::Versions, id)?;
        if existed {
            log::debug!("deleted local version {id}");
        }
        Ok(existed)
    }

    /// Remove all local versions unconditionally.
    ///
    /// Together with [`list_all`](Self::list_all) this is the primitive a
    /// local-to-remote migration service would drive after login.
    pub fn clear(&self) -> Result<()> {
        self.db.clear(Collection::Versions)
    }

    /// Number of stored versions. Used by UI banners; local storage is
    /// unbounded, so this never feeds capacity enforcement.
    pub fn count(&self) -> Result<u64> {
        self.db.count(Collection::Versions)
    }
}

/// [`VersionBackend`] over the embedded database. Ids and timestamps are
/// client-stamped; capacity is unbounded.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    repo: LocalVersionRepo,
}

impl LocalBackend {
    /// Backend over the given database handle.
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self {
            repo: LocalVersionRepo::new(db),
        }
    }

    /// The underlying repository.
    pub fn repo(&self) -> &LocalVersionRepo {
        &self.repo
    }
}

#[async_trait]
impl VersionBackend for LocalBackend {
    async fn list(&self, _limit: usize) -> Result<Vec<Version>> {
        // Local history is unbounded; the limit only applies remotely.
        Ok(self.repo.list_all())
    }

    async fn save(&self, draft: VersionDraft) -> Result<Version> {
        let version = Version {
            id: local_version_id(),
            content: draft.content,
            kind: draft.kind,
            version_number: draft.version_number,
            description: draft.description,
            topic: draft.topic,
            framework_id: draft.framework_id,
            framework_name: draft.framework_name,
            original_input: draft.original_input,
            created_at: Utc::now().to_rfc3339(),
            user_id: None,
        };
        self.repo.save(&version)?;
        Ok(version)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.repo.delete_by_id(id).map(|_| ())
    }

    async fn get(&self, id: &str) -> Result<Option<Version>> {
        self.repo.get_by_id(id)
    }
}
