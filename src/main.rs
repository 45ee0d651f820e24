use std::sync::Arc;

use anyhow::Context;

use zonewatch::engine::RefreshRunner;
use zonewatch::market::{QuoteSource, YahooQuoteClient};
use zonewatch::notify::{AlertSink, TelegramNotifier};
use zonewatch::sched::RefreshScheduler;
use zonewatch::store::SqliteStore;
use zonewatch::Database;

const DB_PATH_ENV: &str = "ZONEWATCH_DB";
const DEFAULT_DB_PATH: &str = "zonewatch.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let db_path = std::env::var(DB_PATH_ENV).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    log::info!("Database path: {}", db_path);

    let database = Database::new(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;
    let store = Arc::new(SqliteStore::new(Arc::new(database)));

    let settings = store.get_settings().context("Failed to load settings")?;

    let sink: Option<Arc<dyn AlertSink>> = if settings.alerts_enabled {
        match TelegramNotifier::from_env() {
            Some(notifier) => {
                log::info!("Telegram alerting enabled");
                Some(Arc::new(notifier))
            }
            None => {
                log::info!("Telegram credentials not configured, alerts are log-only");
                None
            }
        }
    } else {
        None
    };

    let quotes = Arc::new(YahooQuoteClient::new());
    log::info!("Quote source: {}", quotes.source_name());
    let runner = Arc::new(RefreshRunner::new(store.clone(), quotes, sink));

    // One immediate cycle so the dashboard is fresh on startup
    match runner.run_cycle().await {
        Ok(report) => log::info!(
            "Startup refresh: {} checked, {} activated, {} closed",
            report.checked,
            report.triggered,
            report.exited
        ),
        Err(e) => log::error!("Startup refresh failed: {}", e),
    }

    let scheduler = RefreshScheduler::new(runner);
    if settings.auto_refresh_enabled {
        scheduler
            .start(settings.refresh_interval_secs.max(1) as u64)
            .await;
    } else {
        log::info!("Auto refresh disabled in settings");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    log::info!("Shutdown signal received");

    scheduler.stop().await;

    Ok(())
}
