use async_trait::async_trait;

use super::error::MarketError;

/// Quote-source seam. The refresh engine only ever asks one question: the
/// latest closing price for a fully-qualified symbol. Symbol suffix handling
/// happens before this trait is called (see `symbols`).
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Source name for logging (e.g. "yahoo").
    fn source_name(&self) -> &str;

    /// Latest close for the symbol, rounded to 2 decimals.
    async fn latest_close(&self, symbol: &str) -> Result<f64, MarketError>;
}
