pub mod sqlite;

use thiserror::Error;

use crate::models::{CreateTradeInput, Trade, TradeFilters, TradeStatus, UpdateTradeInput};

pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Trade {0} not found")]
    NotFound(i64),
}

/// One write-back produced by a refresh cycle. The price is always written;
/// status and timestamps only when the lifecycle engine reported a change.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeWrite {
    pub id: i64,
    pub cmp: f64,
    pub status: Option<TradeStatus>,
    pub trigger_date: Option<String>,
    pub exit_date: Option<String>,
}

impl TradeWrite {
    /// Price-only refresh, no lifecycle change.
    pub fn price_only(id: i64, cmp: f64) -> Self {
        Self {
            id,
            cmp,
            status: None,
            trigger_date: None,
            exit_date: None,
        }
    }
}

/// Storage seam for trade records. SQLite is the shipped adapter; the refresh
/// engine and views only ever talk to this trait.
pub trait TradeStore: Send + Sync {
    fn list(&self, filters: &TradeFilters) -> Result<Vec<Trade>, StoreError>;

    /// Every trade not in a terminal state, including legacy rows whose
    /// status column is missing or blank.
    fn list_open(&self) -> Result<Vec<Trade>, StoreError>;

    fn get(&self, id: i64) -> Result<Option<Trade>, StoreError>;

    fn create(&self, input: &CreateTradeInput) -> Result<Trade, StoreError>;

    fn update(&self, id: i64, input: &UpdateTradeInput) -> Result<Trade, StoreError>;

    /// Deleting an id that no longer exists is a silent no-op.
    fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Apply all writes of one refresh cycle in a single transaction so a
    /// concurrent reader never observes a half-applied cycle.
    fn batch_apply(&self, writes: &[TradeWrite]) -> Result<(), StoreError>;

    /// Persist the dedup memo after an alert was dispatched.
    fn set_last_alert(&self, id: i64, label: &str) -> Result<(), StoreError>;
}
