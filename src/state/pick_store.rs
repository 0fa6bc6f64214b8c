//! Thread-safe pick storage.
//!
//! `InMemoryPickStore` keeps every pick behind one `RwLock` and can mirror
//! its contents to a JSON file after each write. Settlement goes through
//! `update_status`, a compare-and-swap that only moves a pick out of
//! `pending`, so two settlement passes racing on the same pick cannot both
//! apply.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::odds::math::american_to_payout;
use crate::picks::models::{PickResult, PickStatus, TrackedPick};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Pick not found: {0}")]
    NotFound(String),

    #[error("Pick already exists: {0}")]
    Duplicate(String),

    #[error("Pick {id} has invalid American odds {odds}")]
    InvalidOdds { id: String, odds: i32 },

    #[error("Pick {id} already settled as {status}")]
    AlreadySettled { id: String, status: PickStatus },

    #[error("Pick file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pick file serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage seam for tracked picks.
pub trait PickStore: Send + Sync {
    fn save(&self, pick: TrackedPick) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Option<TrackedPick>;

    /// Pending picks, oldest game first.
    fn get_pending(&self) -> Vec<TrackedPick>;

    /// Move a pending pick to `status`. Fails with `AlreadySettled` if the
    /// pick left `pending` in the meantime.
    fn update_status(
        &self,
        id: &str,
        status: PickStatus,
        result: Option<PickResult>,
    ) -> Result<TrackedPick, StoreError>;

    /// Most recently created picks first.
    fn get_recent(&self, limit: usize) -> Vec<TrackedPick>;

    fn all(&self) -> Vec<TrackedPick>;

    /// Pending picks whose game has started: the settlement queue.
    fn get_due(&self, now: DateTime<Utc>) -> Vec<TrackedPick> {
        self.get_pending()
            .into_iter()
            .filter(|p| p.is_due(now))
            .collect()
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
struct Inner {
    picks: HashMap<String, TrackedPick>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPickStore {
    inner: Arc<RwLock<Inner>>,
    path: Option<PathBuf>,
}

impl InMemoryPickStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store mirrored to `path`. Existing picks in the file are loaded;
    /// a missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut picks = HashMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if !content.trim().is_empty() {
                let loaded: Vec<TrackedPick> = serde_json::from_str(&content)?;
                for pick in loaded {
                    if american_to_payout(pick.odds).is_err() {
                        warn!(pick_id = %pick.id, odds = pick.odds, "Loaded pick has invalid odds");
                    }
                    picks.insert(pick.id.clone(), pick);
                }
            }
            info!(path = %path.display(), picks = picks.len(), "Loaded pick file");
        } else {
            info!(path = %path.display(), "Pick file not found, starting empty");
        }

        Ok(Self {
            inner: Arc::new(RwLock::new(Inner { picks })),
            path: Some(path),
        })
    }

    pub fn len(&self) -> usize {
        self.read().picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().picks.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Write the whole store to its file, if it has one. Called with the
    /// write lock held so the file never interleaves two snapshots.
    fn persist(&self, inner: &Inner) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut picks: Vec<&TrackedPick> = inner.picks.values().collect();
        picks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&picks)?)?;
        std::fs::rename(&tmp, path)?;

        debug!(path = %path.display(), picks = picks.len(), "Pick file written");
        Ok(())
    }
}

impl PickStore for InMemoryPickStore {
    fn save(&self, pick: TrackedPick) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.picks.contains_key(&pick.id) {
            return Err(StoreError::Duplicate(pick.id));
        }
        if american_to_payout(pick.odds).is_err() {
            return Err(StoreError::InvalidOdds {
                id: pick.id,
                odds: pick.odds,
            });
        }
        debug!(pick_id = %pick.id, game_id = %pick.game_id, bet_type = %pick.bet_type, "Saving pick");
        inner.picks.insert(pick.id.clone(), pick);
        self.persist(&inner)
    }

    fn get(&self, id: &str) -> Option<TrackedPick> {
        self.read().picks.get(id).cloned()
    }

    fn get_pending(&self) -> Vec<TrackedPick> {
        let mut pending: Vec<TrackedPick> = self
            .read()
            .picks
            .values()
            .filter(|p| p.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.game_time.cmp(&b.game_time).then_with(|| a.id.cmp(&b.id)));
        pending
    }

    fn update_status(
        &self,
        id: &str,
        status: PickStatus,
        result: Option<PickResult>,
    ) -> Result<TrackedPick, StoreError> {
        let mut inner = self.write();
        let pick = inner
            .picks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !pick.is_pending() {
            return Err(StoreError::AlreadySettled {
                id: id.to_string(),
                status: pick.status,
            });
        }

        pick.status = status;
        if result.is_some() {
            pick.result = result;
        }
        let updated = pick.clone();

        if let Err(e) = self.persist(&inner) {
            warn!(pick_id = %id, error = %e, "Pick settled in memory but file write failed");
            return Err(e);
        }
        Ok(updated)
    }

    fn get_recent(&self, limit: usize) -> Vec<TrackedPick> {
        let mut picks = self.all();
        picks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        picks.truncate(limit);
        picks
    }

    fn all(&self) -> Vec<TrackedPick> {
        let mut picks: Vec<TrackedPick> = self.read().picks.values().cloned().collect();
        picks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        picks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picks::models::BetType;
    use chrono::Duration;

    fn pick(id: &str, minutes: i64) -> TrackedPick {
        let base = Utc::now() - Duration::hours(2);
        TrackedPick {
            id: id.to_string(),
            game_id: format!("game-{id}"),
            sport: "basketball_nba".to_string(),
            home_team: "Charlotte Hornets".to_string(),
            away_team: "Detroit Pistons".to_string(),
            game_time: base + Duration::minutes(minutes),
            created_at: base + Duration::minutes(minutes),
            bet_type: BetType::Moneyline,
            pick: "Charlotte Hornets".to_string(),
            side: None,
            odds: -110,
            line: None,
            confidence: 60,
            reasoning: String::new(),
            edge: None,
            is_value_bet: false,
            status: PickStatus::Pending,
            result: None,
        }
    }

    #[test]
    fn test_save_and_duplicate() {
        let store = InMemoryPickStore::new();
        store.save(pick("a", 0)).unwrap();
        assert!(matches!(store.save(pick("a", 1)), Err(StoreError::Duplicate(_))));
        assert_eq!(store.get("a").unwrap().game_id, "game-a");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_save_rejects_unreadable_odds() {
        let store = InMemoryPickStore::new();
        let mut bad = pick("a", 0);
        bad.odds = 0;
        assert!(matches!(
            store.save(bad),
            Err(StoreError::InvalidOdds { odds: 0, .. })
        ));
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_update_status_is_compare_and_swap() {
        let store = InMemoryPickStore::new();
        store.save(pick("a", 0)).unwrap();

        let updated = store.update_status("a", PickStatus::Won, None).unwrap();
        assert_eq!(updated.status, PickStatus::Won);

        let err = store.update_status("a", PickStatus::Lost, None).unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadySettled { status: PickStatus::Won, .. }
        ));
        assert_eq!(store.get("a").unwrap().status, PickStatus::Won);

        assert!(matches!(
            store.update_status("zzz", PickStatus::Won, None),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_pending_recent_and_due() {
        let store = InMemoryPickStore::new();
        store.save(pick("a", 0)).unwrap();
        store.save(pick("b", 10)).unwrap();
        store.save(pick("c", 600)).unwrap();
        store.update_status("b", PickStatus::Push, None).unwrap();

        let pending: Vec<String> = store.get_pending().into_iter().map(|p| p.id).collect();
        assert_eq!(pending, vec!["a", "c"]);

        let recent: Vec<String> = store.get_recent(2).into_iter().map(|p| p.id).collect();
        assert_eq!(recent, vec!["c", "b"]);

        // "c" starts eight hours from now.
        let due: Vec<String> = store.get_due(Utc::now()).into_iter().map(|p| p.id).collect();
        assert_eq!(due, vec!["a"]);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("picks-{}.json", uuid::Uuid::new_v4()));
        {
            let store = InMemoryPickStore::open(&path).unwrap();
            store.save(pick("a", 0)).unwrap();
            store.save(pick("b", 5)).unwrap();
            store.update_status("a", PickStatus::Lost, None).unwrap();
        }

        let reopened = InMemoryPickStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get("a").unwrap().status, PickStatus::Lost);
        assert!(reopened.get("b").unwrap().is_pending());
        let _ = std::fs::remove_file(&path);
    }
}
