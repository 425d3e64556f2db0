//! Unified version store driven by the editor UI.
//!
//! [`WorkspaceStore`] owns the editor's input/output text and an in-memory
//! snapshot of the version list. All version I/O goes through the injected
//! [`VersionBackend`], chosen once at construction: local for anonymous
//! sessions, remote for signed-in ones. The UI never learns which one it
//! got.
//!
//! Read/write failure policy (see the error module): list reads degrade to
//! an empty history, deletes resolve to `false`, saves propagate so the UI
//! can offer a retry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{Collection, LocalDatabase};
use crate::error::{PromptforgeError, Result};
use crate::version::{Version, VersionBackend, VersionDraft};

/// Settings key under which the input/output snapshot is persisted.
const SESSION_KEY: &str = "workspace_session";

/// How many versions the recency projection and a remote load return.
const RECENT_LIMIT: usize = 20;

/// Cache-only partial update applied by [`WorkspaceStore::update_version`].
#[derive(Debug, Clone, Default)]
pub struct VersionUpdate {
    /// Replacement prompt text.
    pub content: Option<String>,
    /// Replacement note.
    pub description: Option<String>,
    /// Replacement topic label.
    pub topic: Option<String>,
    /// Replacement display label.
    pub version_number: Option<String>,
}

/// Persisted subset of the store: only the editor text survives a restart.
/// The version list is always reloaded through the backend, never trusted
/// from stale persisted state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionSnapshot {
    input: String,
    output: String,
}

/// Stateful façade between the editor UI and whichever backend holds the
/// user's versions.
pub struct WorkspaceStore {
    input: String,
    output: String,
    versions: Vec<Version>,
    is_loading_versions: bool,
    backend: Arc<dyn VersionBackend>,
}

impl WorkspaceStore {
    /// Store over the given backend.
    pub fn new(backend: Arc<dyn VersionBackend>) -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            versions: Vec::new(),
            is_loading_versions: false,
            backend,
        }
    }

    /// Current requirement text.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the requirement text.
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Current generated prompt text.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Replace the generated prompt text.
    pub fn set_output(&mut self, output: impl Into<String>) {
        self.output = output.into();
    }

    /// The in-memory version list, as last loaded or mutated.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Whether a load is in flight.
    pub fn is_loading_versions(&self) -> bool {
        self.is_loading_versions
    }

    /// Reload the version list from the backend, replacing the in-memory
    /// list wholesale.
    ///
    /// Never fails: any backend error resolves to an empty list, is logged,
    /// and clears the loading flag. History reads are best-effort.
    pub async fn load_versions(&mut self) {
        self.is_loading_versions = true;

        match self.backend.list(RECENT_LIMIT).await {
            Ok(versions) => {
                log::debug!("loaded {} versions", versions.len());
                self.versions = versions;
            }
            Err(e) => {
                log::warn!("failed to load versions: {e}");
                self.versions.clear();
            }
        }

        self.is_loading_versions = false;
    }

    /// Persist a draft through the backend and prepend the result to the
    /// in-memory list.
    ///
    /// On a capacity-bounded backend the in-memory length is checked first:
    /// a full list fails fast with the quota error before any backend I/O.
    /// That check is a latency optimization; the server remains the
    /// authoritative enforcer. After a successful save the list is truncated
    /// to the capacity, mirroring server-side eviction.
    pub async fn save_version(&mut self, draft: VersionDraft) -> Result<Version> {
        if draft.content.trim().is_empty() {
            return Err(PromptforgeError::EmptyContent);
        }

        if let Some(cap) = self.backend.capacity() {
            if self.versions.len() >= cap {
                return Err(PromptforgeError::QuotaExceeded { limit: cap });
            }
        }

        let saved = self.backend.save(draft).await?;
        log::debug!("saved version {}", saved.id);

        self.versions.insert(0, saved.clone());
        if let Some(cap) = self.backend.capacity() {
            self.versions.truncate(cap);
        }

        Ok(saved)
    }

    /// Delete a version by id and drop it from the in-memory list.
    ///
    /// Resolves to `false` on any failure; delete errors are logged and
    /// never propagate to the UI as exceptions.
    pub async fn delete_version(&mut self, id: &str) -> bool {
        match self.backend.delete(id).await {
            Ok(()) => {
                self.versions.retain(|v| v.id != id);
                log::debug!("deleted version {id}");
                true
            }
            Err(e) => {
                log::warn!("failed to delete version {id}: {e}");
                false
            }
        }
    }

    /// Apply a partial update to the matching in-memory entry.
    ///
    /// Cache-only: neither backend is touched. Returns `false` when no
    /// entry matches the id.
    pub fn update_version(&mut self, id: &str, updates: VersionUpdate) -> bool {
        let Some(version) = self.versions.iter_mut().find(|v| v.id == id) else {
            return false;
        };

        if let Some(content) = updates.content {
            version.content = content;
        }
        if let Some(description) = updates.description {
            version.description = Some(description);
        }
        if let Some(topic) = updates.topic {
            version.topic = Some(topic);
        }
        if let Some(version_number) = updates.version_number {
            version.version_number = version_number;
        }
        true
    }

    /// Empty the in-memory list. The backend is untouched; whatever it
    /// holds remains retrievable through a later load.
    pub fn clear_versions(&mut self) {
        self.versions.clear();
    }

    /// Recency projection: the in-memory list sorted strictly newest-first
    /// by `created_at`, capped at 20. Pure read, no side effects.
    pub fn recent_versions(&self) -> Vec<Version> {
        let mut versions = self.versions.clone();
        crate::version::sort_recent(&mut versions);
        versions.truncate(RECENT_LIMIT);
        versions
    }

    /// Persist the input/output snapshot to the settings collection.
    pub fn save_session(&self, db: &LocalDatabase) -> Result<()> {
        let snapshot = SessionSnapshot {
            input: self.input.clone(),
            output: self.output.clone(),
        };
        db.put(
            Collection::Settings,
            SESSION_KEY,
            &serde_json::to_value(&snapshot)?,
        )
    }

    /// Restore the input/output snapshot, if one was persisted. The version
    /// list is left alone; it only ever comes from a load.
    pub fn load_session(&mut self, db: &LocalDatabase) -> Result<()> {
        if let Some(record) = db.get(Collection::Settings, SESSION_KEY)? {
            let snapshot: SessionSnapshot = serde_json::from_value(record)?;
            self.input = snapshot.input;
            self.output = snapshot.output;
        }
        Ok(())
    }
}

impl std::fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("versions", &self.versions.len())
            .field("is_loading_versions", &self.is_loading_versions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{
        LocalBackend, LocalVersionRepo, REMOTE_VERSION_CAP, VersionKind, local_version_id,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted stand-in for the remote service.
    struct MockBackend {
        versions: Mutex<Vec<Version>>,
        capacity: Option<usize>,
        fail_list: bool,
        fail_delete: bool,
        calls: AtomicUsize,
    }

    impl MockBackend {
        fn remote() -> Self {
            Self {
                versions: Mutex::new(Vec::new()),
                capacity: Some(REMOTE_VERSION_CAP),
                fail_list: false,
                fail_delete: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn stored(&self) -> Vec<Version> {
            self.versions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VersionBackend for MockBackend {
        fn capacity(&self) -> Option<usize> {
            self.capacity
        }

        async fn list(&self, limit: usize) -> crate::error::Result<Vec<Version>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_list {
                return Err(PromptforgeError::Remote {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            let versions = self.versions.lock().unwrap();
            Ok(versions.iter().take(limit).cloned().collect())
        }

        async fn save(&self, draft: VersionDraft) -> crate::error::Result<Version> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let version = Version {
                id: format!("srv-{}", self.call_count()),
                content: draft.content,
                kind: draft.kind,
                version_number: draft.version_number,
                description: draft.description,
                topic: draft.topic,
                framework_id: draft.framework_id,
                framework_name: draft.framework_name,
                original_input: draft.original_input,
                created_at: Utc::now().to_rfc3339(),
                user_id: Some("u-1".to_string()),
            };
            self.versions.lock().unwrap().insert(0, version.clone());
            Ok(version)
        }

        async fn delete(&self, id: &str) -> crate::error::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                return Err(PromptforgeError::Remote {
                    status: 404,
                    message: "no such version".to_string(),
                });
            }
            self.versions.lock().unwrap().retain(|v| v.id != id);
            Ok(())
        }

        async fn get(&self, id: &str) -> crate::error::Result<Option<Version>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .versions
                .lock()
                .unwrap()
                .iter()
                .find(|v| v.id == id)
                .cloned())
        }
    }

    fn local_store() -> (WorkspaceStore, Arc<LocalDatabase>) {
        let db = Arc::new(LocalDatabase::in_memory().unwrap());
        let store = WorkspaceStore::new(Arc::new(LocalBackend::new(Arc::clone(&db))));
        (store, db)
    }

    fn stamped(id: &str, created_at: &str) -> Version {
        Version {
            id: id.to_string(),
            content: "text".to_string(),
            kind: VersionKind::Save,
            version_number: "V1".to_string(),
            description: None,
            topic: None,
            framework_id: None,
            framework_name: None,
            original_input: None,
            created_at: created_at.to_string(),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_anonymous_save_delete_clear_scenario() {
        let (mut store, db) = local_store();

        let a = store
            .save_version(VersionDraft::new("draft one", VersionKind::Save, "V1"))
            .await
            .unwrap();
        let b = store
            .save_version(VersionDraft::new("draft two", VersionKind::Optimize, "V2"))
            .await
            .unwrap();

        // Most-recent-first: B then A.
        let recent = store.recent_versions();
        let ids: Vec<&str> = recent.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, [b.id.as_str(), a.id.as_str()]);

        assert!(store.delete_version(&a.id).await);
        let ids: Vec<String> = store.versions().iter().map(|v| v.id.clone()).collect();
        assert_eq!(ids, [b.id.clone()]);

        // Cache clear does not mutate the backend: B stays retrievable.
        store.clear_versions();
        assert!(store.versions().is_empty());
        let repo = LocalVersionRepo::new(db);
        let remaining = repo.list_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
    }

    #[tokio::test]
    async fn test_save_round_trip_preserves_fields() {
        let (mut store, _db) = local_store();
        let draft = VersionDraft {
            content: "full draft".to_string(),
            kind: VersionKind::Optimize,
            version_number: "V7".to_string(),
            description: Some("note".to_string()),
            topic: Some("emails".to_string()),
            framework_id: Some("crispe".to_string()),
            framework_name: Some("CRISPE".to_string()),
            original_input: Some("write an email".to_string()),
        };

        let saved = store.save_version(draft.clone()).await.unwrap();
        store.load_versions().await;

        let loaded = &store.versions()[0];
        assert_eq!(loaded, &saved);
        assert_eq!(loaded.content, draft.content);
        assert_eq!(loaded.topic, draft.topic);
        assert_eq!(loaded.framework_name, draft.framework_name);
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let (mut store, _db) = local_store();
        let err = store
            .save_version(VersionDraft::new("   ", VersionKind::Save, "V1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PromptforgeError::EmptyContent));
        assert!(store.versions().is_empty());
    }

    #[tokio::test]
    async fn test_quota_short_circuits_before_backend() {
        let backend = Arc::new(MockBackend::remote());
        let mut store = WorkspaceStore::new(Arc::clone(&backend) as Arc<dyn VersionBackend>);

        for i in 0..REMOTE_VERSION_CAP {
            store
                .save_version(VersionDraft::new(
                    format!("content {i}"),
                    VersionKind::Save,
                    format!("V{i}"),
                ))
                .await
                .unwrap();
        }
        assert_eq!(store.versions().len(), REMOTE_VERSION_CAP);
        let calls_before = backend.call_count();

        // The 21st save is rejected client-side: no backend call is issued
        // and the in-memory list is unchanged.
        let err = store
            .save_version(VersionDraft::new("one too many", VersionKind::Save, "V21"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PromptforgeError::QuotaExceeded { limit: REMOTE_VERSION_CAP }
        ));
        assert_eq!(backend.call_count(), calls_before);
        assert_eq!(store.versions().len(), REMOTE_VERSION_CAP);
    }

    #[tokio::test]
    async fn test_local_saves_unbounded() {
        let (mut store, db) = local_store();
        for i in 0..REMOTE_VERSION_CAP + 5 {
            store
                .save_version(VersionDraft::new(
                    format!("content {i}"),
                    VersionKind::Save,
                    format!("V{i}"),
                ))
                .await
                .unwrap();
        }
        assert_eq!(store.versions().len(), REMOTE_VERSION_CAP + 5);
        let repo = LocalVersionRepo::new(db);
        assert_eq!(repo.count().unwrap() as usize, REMOTE_VERSION_CAP + 5);
        // The recency projection stays capped regardless.
        assert_eq!(store.recent_versions().len(), REMOTE_VERSION_CAP);
    }

    #[tokio::test]
    async fn test_load_failure_degrades_to_empty() {
        let backend = Arc::new(MockBackend {
            fail_list: true,
            ..MockBackend::remote()
        });
        let mut store = WorkspaceStore::new(backend as Arc<dyn VersionBackend>);
        store.versions.push(stamped("stale", "2025-01-01T00:00:00Z"));

        store.load_versions().await;

        assert!(store.versions().is_empty());
        assert!(!store.is_loading_versions());
    }

    #[tokio::test]
    async fn test_remote_delete_failure_resolves_false() {
        let backend = Arc::new(MockBackend {
            fail_delete: true,
            ..MockBackend::remote()
        });
        let mut store = WorkspaceStore::new(Arc::clone(&backend) as Arc<dyn VersionBackend>);
        store.versions.push(stamped("srv-1", "2025-01-01T00:00:00Z"));

        assert!(!store.delete_version("srv-1").await);
        // The entry stays until a deletion is confirmed.
        assert_eq!(store.versions().len(), 1);
    }

    #[tokio::test]
    async fn test_update_version_is_cache_only() {
        let backend = Arc::new(MockBackend::remote());
        let mut store = WorkspaceStore::new(Arc::clone(&backend) as Arc<dyn VersionBackend>);
        let saved = store
            .save_version(VersionDraft::new("original", VersionKind::Save, "V1"))
            .await
            .unwrap();
        let calls_before = backend.call_count();

        let updated = store.update_version(
            &saved.id,
            VersionUpdate {
                description: Some("edited note".to_string()),
                ..Default::default()
            },
        );

        assert!(updated);
        assert_eq!(
            store.versions()[0].description.as_deref(),
            Some("edited note")
        );
        // Backend untouched: no new calls, stored copy unchanged.
        assert_eq!(backend.call_count(), calls_before);
        assert_eq!(backend.stored()[0].description, None);

        assert!(!store.update_version("unknown-id", VersionUpdate::default()));
    }

    #[tokio::test]
    async fn test_recent_versions_sorted_regardless_of_insertion() {
        let (mut store, _db) = local_store();
        store.versions = vec![
            stamped("old", "2025-01-01T00:00:00Z"),
            stamped("newest", "2025-03-01T00:00:00Z"),
            stamped("mid", "2025-02-01T00:00:00Z"),
        ];

        let recent = store.recent_versions();
        let ids: Vec<&str> = recent.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["newest", "mid", "old"]);
        // Projection is pure: the backing list order is untouched.
        assert_eq!(store.versions()[0].id, "old");
    }

    #[tokio::test]
    async fn test_session_snapshot_round_trip() {
        let (mut store, db) = local_store();
        store.set_input("my requirement");
        store.set_output("generated prompt");
        store.versions.push(stamped(&local_version_id(), "2025-01-01T00:00:00Z"));
        store.save_session(&db).unwrap();

        let mut restored = WorkspaceStore::new(Arc::new(LocalBackend::new(Arc::clone(&db))));
        restored.load_session(&db).unwrap();

        assert_eq!(restored.input(), "my requirement");
        assert_eq!(restored.output(), "generated prompt");
        // Only the editor text is persisted; versions come from a load.
        assert!(restored.versions().is_empty());
    }
}
