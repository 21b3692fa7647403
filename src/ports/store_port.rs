//! Result persistence port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::BacktestError;
use chrono::NaiveDateTime;

/// A stored result together with the time it was saved.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredResult {
    pub created_at: NaiveDateTime,
    pub result: BacktestResult,
}

/// Stores completed backtests per owner, addressed by numeric id.
pub trait ResultStorePort {
    fn save(&self, owner: &str, result: &BacktestResult) -> Result<StoredResult, BacktestError>;

    fn load(&self, owner: &str, id: u64) -> Result<StoredResult, BacktestError>;

    /// All results of `owner`, newest first.
    fn list(&self, owner: &str) -> Result<Vec<StoredResult>, BacktestError>;

    fn delete(&self, owner: &str, id: u64) -> Result<(), BacktestError>;

    /// Smallest id greater than every id already stored for `owner`.
    fn next_id(&self, owner: &str) -> Result<u64, BacktestError>;
}
