// =============================================================================
// Analysis Store — upsert-by-(symbol, as_of) persistence
// =============================================================================
//
// `save` is idempotent: saving the same `(symbol, as_of)` twice keeps one row,
// the later write wins.  `load_latest` returns the row with the greatest
// `as_of` for a ticker, so a failed refresh never hides an older good result.
//
// `MemoryStore` keeps rows in a BTreeMap and, when given a path, mirrors
// them to a JSON snapshot after every save (tmp file + rename).  Snapshot
// writes are serialised so concurrent saves never share the tmp file.
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::errors::PersistenceError;
use crate::types::AnalysisResult;

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn save(&self, result: &AnalysisResult) -> Result<(), PersistenceError>;

    async fn load_latest(&self, ticker: &str) -> Result<Option<AnalysisResult>, PersistenceError>;

    /// Latest row of every stored ticker, in lexical ticker order.
    async fn load_all_latest(&self) -> Result<Vec<AnalysisResult>, PersistenceError>;

    /// Number of stored `(symbol, as_of)` rows.
    async fn count(&self) -> usize;
}

type Key = (String, NaiveDate);

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<BTreeMap<Key, AnalysisResult>>,
    snapshot_path: Option<PathBuf>,
    /// Held across serialise, write and rename.
    snapshot_lock: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot at `path`, loading any rows it
    /// already holds.  A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rows = BTreeMap::new();

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read analysis snapshot {}", path.display()))?;
            let saved: Vec<AnalysisResult> = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse analysis snapshot {}", path.display()))?;
            for r in saved {
                rows.insert((r.symbol.clone(), r.as_of), r);
            }
        }

        info!(path = %path.display(), rows = rows.len(), "analysis store opened");

        Ok(Self {
            rows: RwLock::new(rows),
            snapshot_path: Some(path),
            snapshot_lock: tokio::sync::Mutex::new(()),
        })
    }

    async fn write_snapshot(&self, path: &Path) -> Result<(), PersistenceError> {
        let _guard = self.snapshot_lock.lock().await;

        // Serialised under the guard so the last rename carries every row.
        let content = {
            let rows = self.rows.read();
            let all: Vec<&AnalysisResult> = rows.values().collect();
            serde_json::to_string_pretty(&all)?
        };

        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|e| PersistenceError::Write(format!("{}: {e}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| PersistenceError::Write(format!("{}: {e}", path.display())))?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn save(&self, result: &AnalysisResult) -> Result<(), PersistenceError> {
        let replaced = self
            .rows
            .write()
            .insert((result.symbol.clone(), result.as_of), result.clone())
            .is_some();

        debug!(
            symbol = %result.symbol,
            as_of = %result.as_of,
            replaced,
            "analysis saved"
        );

        if let Some(path) = &self.snapshot_path {
            self.write_snapshot(path).await?;
        }
        Ok(())
    }

    async fn load_latest(&self, ticker: &str) -> Result<Option<AnalysisResult>, PersistenceError> {
        let rows = self.rows.read();
        let latest = rows
            .range((ticker.to_string(), NaiveDate::MIN)..=(ticker.to_string(), NaiveDate::MAX))
            .next_back()
            .map(|(_, r)| r.clone());
        Ok(latest)
    }

    async fn load_all_latest(&self) -> Result<Vec<AnalysisResult>, PersistenceError> {
        let rows = self.rows.read();
        let mut latest: BTreeMap<&str, &AnalysisResult> = BTreeMap::new();
        // Keys sort by (symbol, as_of), so the last row seen per symbol wins.
        for ((symbol, _), r) in rows.iter() {
            latest.insert(symbol.as_str(), r);
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn count(&self) -> usize {
        self.rows.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrendClass;
    use chrono::{Datelike, TimeZone, Utc};
    use std::sync::Arc;

    fn result(symbol: &str, day: u32, close: f64) -> AnalysisResult {
        AnalysisResult {
            symbol: symbol.into(),
            as_of: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            indicators: BTreeMap::from([("close".to_string(), close)]),
            trend: TrendClass::Sideways,
            bars_used: 30,
            derived_at: Utc.with_ymd_and_hms(2024, 5, day, 21, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = MemoryStore::new();
        store.save(&result("RY.TO", 10, 100.0)).await.unwrap();
        store.save(&result("RY.TO", 10, 101.0)).await.unwrap();
        assert_eq!(store.count().await, 1);

        let latest = store.load_latest("RY.TO").await.unwrap().unwrap();
        assert_eq!(latest.indicator("close"), Some(101.0));
    }

    #[tokio::test]
    async fn load_latest_picks_greatest_as_of() {
        let store = MemoryStore::new();
        store.save(&result("RY.TO", 12, 1.0)).await.unwrap();
        store.save(&result("RY.TO", 10, 2.0)).await.unwrap();
        store.save(&result("RY.TOX", 20, 3.0)).await.unwrap();
        store.save(&result("RY", 25, 4.0)).await.unwrap();

        let latest = store.load_latest("RY.TO").await.unwrap().unwrap();
        assert_eq!(latest.as_of.to_string(), "2024-05-12");
        assert!(store.load_latest("TD.TO").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("pulse-store-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("analyses.json");

        let store = MemoryStore::open(&path).unwrap();
        store.save(&result("TD.TO", 3, 80.0)).await.unwrap();
        store.save(&result("TD.TO", 4, 81.0)).await.unwrap();
        drop(store);

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.count().await, 2);
        let latest = reopened.load_latest("TD.TO").await.unwrap().unwrap();
        assert_eq!(latest.indicator("close"), Some(81.0));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn all_latest_keeps_one_row_per_ticker() {
        let store = MemoryStore::new();
        store.save(&result("TD.TO", 3, 80.0)).await.unwrap();
        store.save(&result("RY.TO", 9, 120.0)).await.unwrap();
        store.save(&result("TD.TO", 7, 82.0)).await.unwrap();

        let all = store.load_all_latest().await.unwrap();
        let keys: Vec<_> = all.iter().map(|r| (r.symbol.as_str(), r.as_of.day())).collect();
        assert_eq!(keys, vec![("RY.TO", 9), ("TD.TO", 7)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_leave_a_readable_snapshot() {
        let dir = std::env::temp_dir().join(format!("pulse-store-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("analyses.json");
        let store = Arc::new(MemoryStore::open(&path).unwrap());

        let tasks: Vec<_> = (0..40u32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let ticker = format!("T{i:02}.TO");
                    store.save(&result(&ticker, 1 + i % 28, f64::from(i))).await
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        drop(store);

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.count().await, 40);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
