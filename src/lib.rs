pub mod db;
pub mod engine;
pub mod market;
pub mod models;
pub mod notify;
pub mod sched;
pub mod store;
pub mod view;

pub use db::Database;
pub use engine::{RefreshReport, RefreshRunner};
pub use market::{QuoteSource, YahooQuoteClient};
pub use notify::{AlertSink, TelegramNotifier};
pub use sched::RefreshScheduler;
pub use store::{SqliteStore, TradeStore};
