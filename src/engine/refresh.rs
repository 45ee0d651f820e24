use std::sync::Arc;

use chrono::Local;
use tokio::sync::Mutex;

use crate::engine::alerts::{self, AlertLabel};
use crate::engine::lifecycle::{self, TransitionKind};
use crate::market::{symbols, QuoteSource};
use crate::notify::{format_alert_message, AlertSink};
use crate::store::{StoreError, TradeStore, TradeWrite};

/// Aggregate result of one refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Trades whose price was fetched this cycle.
    pub checked: u32,
    /// Pending -> Active transitions.
    pub triggered: u32,
    /// Active -> Target-Hit / SL-Hit transitions.
    pub exited: u32,
    /// Alerts dispatched this cycle, also the popup feed.
    pub alerts: Vec<AlertEvent>,
}

#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub trade_id: i64,
    pub stock_name: String,
    pub label: AlertLabel,
    pub cmp: f64,
    pub entry: f64,
    pub trade_type: String,
}

/// Drives one full refresh: fetch prices for every open trade, advance the
/// lifecycle, write back the diff in one batch, then run the alert pass over
/// the refreshed snapshot. Cycles are mutually exclusive; a second caller
/// waits for the running cycle to finish.
pub struct RefreshRunner {
    store: Arc<dyn TradeStore>,
    quotes: Arc<dyn QuoteSource>,
    sink: Option<Arc<dyn AlertSink>>,
    cycle_lock: Mutex<()>,
}

impl RefreshRunner {
    pub fn new(
        store: Arc<dyn TradeStore>,
        quotes: Arc<dyn QuoteSource>,
        sink: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            store,
            quotes,
            sink,
            cycle_lock: Mutex::new(()),
        }
    }

    pub async fn run_cycle(&self) -> Result<RefreshReport, StoreError> {
        let _cycle = self.cycle_lock.lock().await;

        let open = self.store.list_open()?;
        let now = Local::now();

        let mut report = RefreshReport::default();
        let mut writes: Vec<TradeWrite> = Vec::new();

        for trade in &open {
            if trade.stock_name.trim().is_empty() {
                continue;
            }

            let symbol = symbols::quote_symbol(&trade.stock_name);
            let price = match self.quotes.latest_close(&symbol).await {
                Ok(price) => price,
                Err(e) => {
                    // Per-trade failure: skip for this cycle, revisit next one
                    log::warn!("Price fetch failed for {}: {}", symbol, e);
                    continue;
                }
            };

            report.checked += 1;

            let transition = lifecycle::evaluate(trade, price, now);
            match transition.kind {
                TransitionKind::Triggered => report.triggered += 1,
                TransitionKind::Exited => report.exited += 1,
                TransitionKind::None => {}
            }

            writes.push(TradeWrite {
                id: trade.id,
                cmp: price,
                status: transition.changed().then_some(transition.status),
                trigger_date: transition.trigger_date,
                exit_date: transition.exit_date,
            });
        }

        // One transaction per cycle, price always, status only on change
        self.store.batch_apply(&writes)?;

        report.alerts = self.alert_pass().await?;

        log::info!(
            "Refresh cycle done: {} checked, {} activated, {} closed, {} alerts",
            report.checked,
            report.triggered,
            report.exited,
            report.alerts.len()
        );

        Ok(report)
    }

    /// Classify the refreshed open set, dispatch anything that clears the
    /// dedup rule, and persist the new memo.
    async fn alert_pass(&self) -> Result<Vec<AlertEvent>, StoreError> {
        let open = self.store.list_open()?;
        let mut events = Vec::new();

        for trade in &open {
            let proximity = alerts::classify(trade);
            if !alerts::should_dispatch(proximity.label, &trade.last_alert) {
                continue;
            }
            let label = proximity.label.expect("dispatchable label present");

            if let Some(sink) = &self.sink {
                sink.send(&format_alert_message(trade, label)).await;
            }
            self.store.set_last_alert(trade.id, label.as_str())?;

            events.push(AlertEvent {
                trade_id: trade.id,
                stock_name: trade.stock_name.clone(),
                label,
                cmp: trade.cmp,
                entry: trade.entry,
                trade_type: trade.trade_type.clone(),
            });
        }

        Ok(events)
    }
}
