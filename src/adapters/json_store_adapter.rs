//! JSON file result store.
//!
//! Layout: `<root>/<owner>/<id>.json`, one pretty-printed [`StoredResult`] per
//! file.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BacktestError;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{ResultStorePort, StoredResult};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub const DEFAULT_STORE_DIR: &str = "results";

pub struct JsonResultStore {
    root: PathBuf,
}

impl JsonResultStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root from `[store] path`, falling back to `./results`.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let root = config
            .get_string("store", "path")
            .unwrap_or_else(|| DEFAULT_STORE_DIR.to_string());
        Self::new(PathBuf::from(root))
    }

    fn owner_dir(&self, owner: &str) -> Result<PathBuf, BacktestError> {
        let valid = !owner.is_empty()
            && owner
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && owner != "."
            && owner != "..";
        if !valid {
            return Err(BacktestError::Store {
                reason: format!("invalid owner name '{}'", owner),
            });
        }
        Ok(self.root.join(owner))
    }

    fn result_path(&self, owner: &str, id: u64) -> Result<PathBuf, BacktestError> {
        Ok(self.owner_dir(owner)?.join(format!("{}.json", id)))
    }

    fn read_stored(path: &std::path::Path) -> Result<StoredResult, BacktestError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| BacktestError::Store {
            reason: format!("corrupt result file {}: {}", path.display(), e),
        })
    }

    /// Ids stored for `owner`, unordered. A missing owner directory is empty.
    fn stored_ids(&self, owner: &str) -> Result<Vec<u64>, BacktestError> {
        let dir = self.owner_dir(owner)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".json").and_then(|s| s.parse().ok()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

impl ResultStorePort for JsonResultStore {
    fn save(&self, owner: &str, result: &BacktestResult) -> Result<StoredResult, BacktestError> {
        let dir = self.owner_dir(owner)?;
        fs::create_dir_all(&dir)?;

        let stored = StoredResult {
            created_at: chrono::Local::now().naive_local(),
            result: result.clone(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(|e| BacktestError::Store {
            reason: format!("failed to encode result {}: {}", result.id, e),
        })?;
        let path = self.result_path(owner, result.id)?;
        fs::write(&path, json)?;

        tracing::info!(owner, id = result.id, path = %path.display(), "result saved");
        Ok(stored)
    }

    fn load(&self, owner: &str, id: u64) -> Result<StoredResult, BacktestError> {
        let path = self.result_path(owner, id)?;
        if !path.exists() {
            return Err(BacktestError::NotFound {
                owner: owner.to_string(),
                id,
            });
        }
        Self::read_stored(&path)
    }

    fn list(&self, owner: &str) -> Result<Vec<StoredResult>, BacktestError> {
        let mut results = self
            .stored_ids(owner)?
            .into_iter()
            .map(|id| self.load(owner, id))
            .collect::<Result<Vec<_>, _>>()?;
        results.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.result.id.cmp(&a.result.id))
        });
        Ok(results)
    }

    fn delete(&self, owner: &str, id: u64) -> Result<(), BacktestError> {
        let path = self.result_path(owner, id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(owner, id, "result deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BacktestError::NotFound {
                owner: owner.to_string(),
                id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn next_id(&self, owner: &str) -> Result<u64, BacktestError> {
        Ok(self.stored_ids(owner)?.into_iter().max().map_or(1, |id| id + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::run_backtest;
    use crate::domain::config::{StrategyConfig, StrategyKind};
    use crate::domain::price::PriceBar;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn result(id: u64) -> BacktestResult {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<PriceBar> = (0..10)
            .map(|i| PriceBar::from_close(start + chrono::Duration::days(i), 100.0 + i as f64))
            .collect();
        let config = StrategyConfig {
            name: format!("run-{}", id),
            symbol: "SPY".into(),
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            initial_capital: 1000.0,
            sell_ratio: 1.0,
            kind: StrategyKind::SmaBreakout { period: 3 },
            contribution: None,
            allocations: Vec::new(),
        };
        run_backtest(&config, &bars, id).unwrap()
    }

    fn store() -> (TempDir, JsonResultStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonResultStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn save_then_load() {
        let (_dir, store) = store();
        let saved = store.save("alice", &result(1)).unwrap();
        let loaded = store.load("alice", 1).unwrap();
        assert_eq!(loaded.created_at, saved.created_at);
        assert_eq!(loaded.result.id, 1);
        assert_eq!(loaded.result.strategy_name, "run-1");
        assert_eq!(loaded.result.trades.len(), saved.result.trades.len());
        assert_eq!(loaded.result.params, saved.result.params);
    }

    #[test]
    fn next_id_starts_at_one_and_follows_max() {
        let (_dir, store) = store();
        assert_eq!(store.next_id("alice").unwrap(), 1);
        store.save("alice", &result(1)).unwrap();
        store.save("alice", &result(5)).unwrap();
        assert_eq!(store.next_id("alice").unwrap(), 6);
        assert_eq!(store.next_id("bob").unwrap(), 1);
    }

    #[test]
    fn owners_are_isolated() {
        let (_dir, store) = store();
        store.save("alice", &result(1)).unwrap();
        assert!(matches!(
            store.load("bob", 1),
            Err(BacktestError::NotFound { .. })
        ));
        assert!(store.list("bob").unwrap().is_empty());
    }

    #[test]
    fn list_is_newest_first() {
        let (_dir, store) = store();
        store.save("alice", &result(1)).unwrap();
        store.save("alice", &result(2)).unwrap();
        let ids: Vec<u64> = store
            .list("alice")
            .unwrap()
            .iter()
            .map(|s| s.result.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn delete_removes_and_reports_missing() {
        let (_dir, store) = store();
        store.save("alice", &result(3)).unwrap();
        store.delete("alice", 3).unwrap();
        assert!(matches!(
            store.delete("alice", 3),
            Err(BacktestError::NotFound { id: 3, .. })
        ));
    }

    #[test]
    fn rejects_path_like_owner() {
        let (_dir, store) = store();
        assert!(matches!(
            store.save("../evil", &result(1)),
            Err(BacktestError::Store { .. })
        ));
        assert!(store.next_id("").is_err());
    }

    #[test]
    fn corrupt_file_is_store_error() {
        let (dir, store) = store();
        fs::create_dir_all(dir.path().join("alice")).unwrap();
        fs::write(dir.path().join("alice").join("4.json"), "{not json").unwrap();
        assert!(matches!(
            store.load("alice", 4),
            Err(BacktestError::Store { .. })
        ));
    }
}
