pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod symbols;
pub mod yahoo;

pub use client::QuoteSource;
pub use error::MarketError;
pub use rate_limiter::QuoteRateLimiter;
pub use yahoo::YahooQuoteClient;
