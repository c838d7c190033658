//! State management: notification dedup, score-delta tracking, scan history
//!
//! JSON-file persistence, no database. Corrupt or missing files load as
//! empty defaults; failed saves are logged and swallowed so a cycle never
//! dies because state could not be persisted.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::scanner::TokenCandidate;
use crate::scoring::round1;

/// A token notified within this window is suppressed from re-notification
const DEDUP_WINDOW_HOURS: i64 = 24;

/// Records older than this are purged on every write
const RETENTION_DAYS: i64 = 7;

/// Scan history ring size, oldest evicted first
const HISTORY_CAP: usize = 100;

/// Candidates snapshotted per scan record
const SCAN_SNAPSHOT_N: usize = 10;

const STATE_FILE: &str = "state.json";
const HISTORY_FILE: &str = "history.json";

/// One notified-token record; at most one live record per address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub symbol: String,
    pub name: String,
    pub score: f64,
    pub last_notified: DateTime<Utc>,
}

/// Snapshot entry within a scan record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEntry {
    pub symbol: String,
    pub name: String,
    pub address: String,
    pub score: f64,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
}

/// One appended scan snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub top: Vec<ScanEntry>,
}

/// Score movement against the last notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreChange {
    pub previous: Option<f64>,
    pub delta: Option<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    notified: HashMap<String, NotificationRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    scans: Vec<ScanRecord>,
}

/// Deduplication state store
pub struct StateStore {
    notified: Arc<RwLock<HashMap<String, NotificationRecord>>>,
    history: Arc<RwLock<VecDeque<ScanRecord>>>,
    state_path: PathBuf,
    history_path: PathBuf,
}

impl StateStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let dir = data_dir.as_ref();
        Self {
            notified: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(VecDeque::new())),
            state_path: dir.join(STATE_FILE),
            history_path: dir.join(HISTORY_FILE),
        }
    }

    /// Load persisted state. Missing or corrupt files fall back to empty
    /// defaults; startup never fails here.
    pub async fn load(&self) {
        if let Some(dir) = self.state_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                warn!("Cannot create state directory {:?}: {}", dir, e);
            }
        }

        let state: StateFile = load_json(&self.state_path).await;
        let history: HistoryFile = load_json(&self.history_path).await;

        let mut notified = self.notified.write().await;
        *notified = state.notified;
        info!("Loaded {} notified-token records", notified.len());
        drop(notified);

        let mut hist = self.history.write().await;
        *hist = history.scans.into_iter().collect();
        while hist.len() > HISTORY_CAP {
            hist.pop_front();
        }
        info!("Loaded {} scan history entries", hist.len());
    }

    // ========================
    // Deduplication
    // ========================

    /// Exclude candidates notified within the last 24 hours.
    /// Input order is preserved.
    pub async fn filter_new(&self, candidates: Vec<TokenCandidate>) -> Vec<TokenCandidate> {
        self.filter_new_at(candidates, Utc::now()).await
    }

    async fn filter_new_at(
        &self,
        candidates: Vec<TokenCandidate>,
        now: DateTime<Utc>,
    ) -> Vec<TokenCandidate> {
        let notified = self.notified.read().await;
        let window = Duration::hours(DEDUP_WINDOW_HOURS);
        let before = candidates.len();

        let new: Vec<TokenCandidate> = candidates
            .into_iter()
            .filter(|c| match notified.get(&c.address) {
                Some(record) if now - record.last_notified < window => {
                    debug!("Skipping {} (notified {})", c.symbol, record.last_notified);
                    false
                }
                _ => true,
            })
            .collect();

        info!("Dedup: {} candidates -> {} new", before, new.len());
        new
    }

    /// Mark candidates as notified, then purge expired records and save.
    /// The retention sweep runs on every write.
    pub async fn mark_notified(&self, candidates: &[TokenCandidate]) {
        self.mark_notified_at(candidates, Utc::now()).await
    }

    async fn mark_notified_at(&self, candidates: &[TokenCandidate], now: DateTime<Utc>) {
        {
            let mut notified = self.notified.write().await;
            for c in candidates {
                notified.insert(
                    c.address.clone(),
                    NotificationRecord {
                        symbol: c.symbol.clone(),
                        name: c.name.clone(),
                        score: c.total_score,
                        last_notified: now,
                    },
                );
            }

            let cutoff = now - Duration::days(RETENTION_DAYS);
            notified.retain(|_, record| record.last_notified > cutoff);
        }

        self.save_state().await;
    }

    // ========================
    // Score-delta tracking
    // ========================

    /// Previous score and delta per candidate; addresses without a record
    /// get `{None, None}`.
    pub async fn get_score_changes(
        &self,
        candidates: &[TokenCandidate],
    ) -> HashMap<String, ScoreChange> {
        let notified = self.notified.read().await;

        candidates
            .iter()
            .map(|c| {
                let change = match notified.get(&c.address) {
                    Some(record) => ScoreChange {
                        previous: Some(record.score),
                        delta: Some(round1(c.total_score - record.score)),
                    },
                    None => ScoreChange {
                        previous: None,
                        delta: None,
                    },
                };
                (c.address.clone(), change)
            })
            .collect()
    }

    // ========================
    // Scan history
    // ========================

    /// Append an immutable snapshot; the ring keeps the most recent 100.
    pub async fn save_scan(&self, candidates: &[TokenCandidate]) {
        self.save_scan_at(candidates, Utc::now()).await
    }

    async fn save_scan_at(&self, candidates: &[TokenCandidate], now: DateTime<Utc>) {
        let record = ScanRecord {
            timestamp: now,
            count: candidates.len(),
            top: candidates
                .iter()
                .take(SCAN_SNAPSHOT_N)
                .map(|c| ScanEntry {
                    symbol: c.symbol.clone(),
                    name: c.name.clone(),
                    address: c.address.clone(),
                    score: c.total_score,
                    liquidity_usd: c.liquidity_usd,
                    volume_24h_usd: c.volume_24h_usd,
                })
                .collect(),
        };

        {
            let mut history = self.history.write().await;
            history.push_back(record);
            while history.len() > HISTORY_CAP {
                history.pop_front();
            }
        }

        self.save_history().await;
    }

    // ========================
    // Reporting accessors
    // ========================

    pub async fn notified_count(&self) -> usize {
        self.notified.read().await.len()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    /// Scan count and total candidates seen within the trailing window
    pub async fn scan_stats_since(&self, since: DateTime<Utc>) -> (usize, usize) {
        let history = self.history.read().await;
        let recent: Vec<&ScanRecord> =
            history.iter().filter(|s| s.timestamp > since).collect();
        let total = recent.iter().map(|s| s.count).sum();
        (recent.len(), total)
    }

    // ========================
    // File operations
    // ========================

    async fn save_state(&self) {
        let snapshot = StateFile {
            notified: self.notified.read().await.clone(),
        };
        write_json(&self.state_path, &snapshot).await;
    }

    async fn save_history(&self) {
        let snapshot = HistoryFile {
            scans: self.history.read().await.iter().cloned().collect(),
        };
        write_json(&self.history_path, &snapshot).await;
    }
}

async fn load_json<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> T {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(value) => value,
            Err(e) => {
                warn!("Corrupt state file {:?}, starting empty: {}", path, e);
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) {
    let data = match serde_json::to_string_pretty(value) {
        Ok(data) => data,
        Err(e) => {
            error!("State serialization failed for {:?}: {}", path, e);
            return;
        }
    };

    if let Err(e) = tokio::fs::write(path, data).await {
        // The in-memory result for this cycle stays valid
        error!("State save failed for {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn candidate(address: &str, score: f64) -> TokenCandidate {
        TokenCandidate {
            address: address.to_string(),
            symbol: format!("SYM{}", &address[address.len().saturating_sub(2)..]),
            name: format!("Token {}", address),
            created_at: Utc::now(),
            liquidity_usd: 10_000.0,
            volume_24h_usd: 5_000.0,
            price_change_24h: 0.0,
            buys_24h: 0,
            sells_24h: 0,
            twitter: None,
            total_score: score,
            scores: StdHashMap::new(),
            social: None,
            mania: None,
        }
    }

    fn store() -> (StateStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (StateStore::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn test_filter_then_mark_then_filter_is_empty() {
        let (store, _dir) = store();
        let now = Utc::now();
        let candidates = vec![candidate("addr1", 50.0), candidate("addr2", 60.0)];

        let new = store.filter_new_at(candidates.clone(), now).await;
        assert_eq!(new.len(), 2);

        store.mark_notified_at(&new, now).await;

        let again = store.filter_new_at(candidates, now).await;
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_record_outside_dedup_window_passes() {
        let (store, _dir) = store();
        let notified_at = Utc::now();
        let candidates = vec![candidate("addr1", 50.0)];

        store.mark_notified_at(&candidates, notified_at).await;

        // 25 hours later the window has passed
        let later = notified_at + Duration::hours(25);
        let new = store.filter_new_at(candidates, later).await;
        assert_eq!(new.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_preserves_order() {
        let (store, _dir) = store();
        let now = Utc::now();
        store
            .mark_notified_at(&[candidate("addr2", 10.0)], now)
            .await;

        let candidates = vec![
            candidate("addr3", 30.0),
            candidate("addr2", 20.0),
            candidate("addr1", 10.0),
        ];
        let new = store.filter_new_at(candidates, now).await;

        assert_eq!(new.len(), 2);
        assert_eq!(new[0].address, "addr3");
        assert_eq!(new[1].address, "addr1");
    }

    #[tokio::test]
    async fn test_score_changes() {
        let (store, _dir) = store();
        let now = Utc::now();
        store
            .mark_notified_at(&[candidate("addr1", 40.0)], now)
            .await;

        let rescored = vec![candidate("addr1", 55.0), candidate("addr9", 70.0)];
        let changes = store.get_score_changes(&rescored).await;

        let known = changes.get("addr1").unwrap();
        assert_eq!(known.previous, Some(40.0));
        assert_eq!(known.delta, Some(15.0));

        let unknown = changes.get("addr9").unwrap();
        assert_eq!(unknown.previous, None);
        assert_eq!(unknown.delta, None);
    }

    #[tokio::test]
    async fn test_rescored_within_window_filtered_but_delta_visible() {
        let (store, _dir) = store();
        let t0 = Utc::now();
        store.mark_notified_at(&[candidate("addr1", 40.0)], t0).await;

        // Re-scored at 55 a few hours later, still inside the window
        let t1 = t0 + Duration::hours(3);
        let rescored = vec![candidate("addr1", 55.0)];

        // Pre-filter pass sees the delta...
        let changes = store.get_score_changes(&rescored).await;
        assert_eq!(changes.get("addr1").unwrap().delta, Some(15.0));

        // ...but the candidate is suppressed
        let new = store.filter_new_at(rescored, t1).await;
        assert!(new.is_empty());
    }

    #[tokio::test]
    async fn test_retention_sweep() {
        let (store, _dir) = store();
        let now = Utc::now();

        // addr_old: 7 days + 1 second old; addr_fresh: 6 days 23 hours
        store
            .mark_notified_at(
                &[candidate("addr_old", 10.0)],
                now - Duration::days(7) - Duration::seconds(1),
            )
            .await;
        store
            .mark_notified_at(
                &[candidate("addr_fresh", 10.0)],
                now - Duration::days(6) - Duration::hours(23),
            )
            .await;
        assert_eq!(store.notified_count().await, 2);

        // Any write triggers the sweep
        store
            .mark_notified_at(&[candidate("addr_new", 10.0)], now)
            .await;

        assert_eq!(store.notified_count().await, 2);
        let changes = store
            .get_score_changes(&[candidate("addr_old", 10.0), candidate("addr_fresh", 10.0)])
            .await;
        assert_eq!(changes.get("addr_old").unwrap().previous, None);
        assert_eq!(changes.get("addr_fresh").unwrap().previous, Some(10.0));
    }

    #[tokio::test]
    async fn test_remark_refreshes_record_age() {
        let (store, _dir) = store();
        let t0 = Utc::now() - Duration::days(10);
        store.mark_notified_at(&[candidate("addr1", 10.0)], t0).await;

        // Re-notified later: age is measured from the update, not creation
        let t1 = Utc::now() - Duration::days(2);
        store.mark_notified_at(&[candidate("addr1", 20.0)], t1).await;

        store
            .mark_notified_at(&[candidate("addr2", 30.0)], Utc::now())
            .await;
        assert_eq!(store.notified_count().await, 2);
    }

    #[tokio::test]
    async fn test_history_cap() {
        let (store, _dir) = store();
        let base = Utc::now() - Duration::hours(200);

        for i in 0..101 {
            let cands = vec![candidate(&format!("addr{}", i), i as f64)];
            store
                .save_scan_at(&cands, base + Duration::hours(i as i64))
                .await;
        }

        assert_eq!(store.history_len().await, 100);

        // The least-recent entry (i = 0) was evicted
        let history = store.history.read().await;
        assert_eq!(history.front().unwrap().top[0].address, "addr1");
        assert_eq!(history.back().unwrap().top[0].address, "addr100");
    }

    #[tokio::test]
    async fn test_snapshot_bounded() {
        let (store, _dir) = store();
        let cands: Vec<TokenCandidate> = (0..25)
            .map(|i| candidate(&format!("addr{}", i), i as f64))
            .collect();
        store.save_scan_at(&cands, Utc::now()).await;

        let history = store.history.read().await;
        let record = history.back().unwrap();
        assert_eq!(record.count, 25);
        assert_eq!(record.top.len(), SCAN_SNAPSHOT_N);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();

        {
            let store = StateStore::new(dir.path());
            store.load().await;
            store
                .mark_notified_at(&[candidate("addr1", 42.5)], now)
                .await;
            store.save_scan_at(&[candidate("addr1", 42.5)], now).await;
        }

        let reloaded = StateStore::new(dir.path());
        reloaded.load().await;
        assert_eq!(reloaded.notified_count().await, 1);
        assert_eq!(reloaded.history_len().await, 1);

        let changes = reloaded
            .get_score_changes(&[candidate("addr1", 50.0)])
            .await;
        assert_eq!(changes.get("addr1").unwrap().previous, Some(42.5));
    }

    #[tokio::test]
    async fn test_corrupt_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(STATE_FILE), "{not json")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join(HISTORY_FILE), "]]")
            .await
            .unwrap();

        let store = StateStore::new(dir.path());
        store.load().await;

        assert_eq!(store.notified_count().await, 0);
        assert_eq!(store.history_len().await, 0);
    }

    #[tokio::test]
    async fn test_scan_stats_since() {
        let (store, _dir) = store();
        let now = Utc::now();

        store
            .save_scan_at(
                &[candidate("a", 1.0), candidate("b", 2.0)],
                now - Duration::hours(30),
            )
            .await;
        store
            .save_scan_at(&[candidate("c", 3.0)], now - Duration::hours(2))
            .await;

        let (scans, total) = store.scan_stats_since(now - Duration::days(1)).await;
        assert_eq!(scans, 1);
        assert_eq!(total, 1);
    }
}
