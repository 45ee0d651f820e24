use thiserror::Error;

/// Quote retrieval failures. All of these are per-symbol and non-fatal: the
/// refresh cycle logs them and skips the trade until the next cycle.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid quote response: {0}")]
    Parse(String),

    #[error("No price data for {0}")]
    NoData(String),

    #[error("Quote API error for {symbol}: {code} - {message}")]
    Api {
        symbol: String,
        code: String,
        message: String,
    },
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Parse(err.to_string())
    }
}
