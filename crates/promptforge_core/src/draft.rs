//! Debounced recovery drafts for in-progress editor text.
//!
//! Independent of the version history: [`DraftAutosave`] snapshots whatever
//! the user is typing so a closed tab or crash loses at most the last
//! second of edits. Every content change re-arms a single-shot timer; only
//! the newest edit survives to be written. This is a debounce, not a
//! throttle: continuous typing produces zero writes until a pause.
//!
//! There is no clear-on-success. The draft key is overwritten by the next
//! edit, so a stale draft can outlive its usefulness; acceptable for a
//! best-effort convenience feature.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{Collection, LocalDatabase};

/// Fixed settings key the draft is stored under.
const DRAFT_KEY: &str = "workspace_draft";

/// Quiet period after the last edit before the draft is written.
const DEBOUNCE: Duration = Duration::from_secs(1);

/// A persisted draft snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// The in-progress editor text.
    pub content: String,
    /// RFC 3339 timestamp of the edit that produced this snapshot.
    pub last_modified: String,
}

/// Debounced draft persistence loop.
///
/// Must be driven from within a tokio runtime; each content change spawns
/// the timer task that may perform the write.
pub struct DraftAutosave {
    db: Arc<LocalDatabase>,
    delay: Duration,
    /// Bumped on every edit; a timer only writes if no newer edit arrived
    /// while it slept.
    generation: Arc<AtomicU64>,
    last_saved: Arc<Mutex<Option<String>>>,
    saves: Arc<AtomicU64>,
}

impl DraftAutosave {
    /// Controller with the standard 1-second debounce.
    pub fn new(db: Arc<LocalDatabase>) -> Self {
        Self::with_delay(db, DEBOUNCE)
    }

    /// Controller with a custom debounce interval.
    pub fn with_delay(db: Arc<LocalDatabase>, delay: Duration) -> Self {
        Self {
            db,
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            last_saved: Arc::new(Mutex::new(None)),
            saves: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a content change and (re)arm the debounce timer.
    ///
    /// Empty content never produces a write; it would clobber a useful
    /// draft with nothing.
    pub fn content_changed(&self, content: String) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let db = Arc::clone(&self.db);
        let delay = self.delay;
        let latest = Arc::clone(&self.generation);
        let last_saved = Arc::clone(&self.last_saved);
        let saves = Arc::clone(&self.saves);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A newer edit re-armed the timer; this snapshot is stale.
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }
            if content.is_empty() {
                return;
            }

            let now = Utc::now().to_rfc3339();
            let draft = Draft {
                content,
                last_modified: now.clone(),
            };
            let record = match serde_json::to_value(&draft) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("failed to encode draft: {e}");
                    return;
                }
            };

            match db.put(Collection::Settings, DRAFT_KEY, &record) {
                Ok(()) => {
                    *last_saved.lock().unwrap() = Some(now);
                    saves.fetch_add(1, Ordering::SeqCst);
                    log::debug!("autosaved draft");
                }
                Err(e) => log::warn!("failed to autosave draft: {e}"),
            }
        });
    }

    /// The stored draft, if any. Absence and read failure both come back as
    /// `None`; drafts are best-effort.
    pub fn load_draft(&self) -> Option<Draft> {
        match self.db.get(Collection::Settings, DRAFT_KEY) {
            Ok(Some(record)) => match serde_json::from_value(record) {
                Ok(draft) => Some(draft),
                Err(e) => {
                    log::warn!("undecodable draft record: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("failed to load draft: {e}");
                None
            }
        }
    }

    /// Mount-time recovery: returns the stored draft content only when no
    /// external initial content was supplied. External content always wins,
    /// so a stale draft never clobbers a freshly generated result.
    pub fn recover(&self, initial: Option<&str>) -> Option<String> {
        if initial.is_some_and(|s| !s.is_empty()) {
            return None;
        }
        self.load_draft().map(|d| d.content)
    }

    /// Timestamp of the most recent successful write, for the "saved at"
    /// label.
    pub fn last_saved(&self) -> Option<String> {
        self.last_saved.lock().unwrap().clone()
    }

    /// Number of successful draft writes since construction.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for DraftAutosave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftAutosave")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
