use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine::alerts::{self, AlertLabel, RangeBucket};
use crate::market::symbols;
use crate::models::{Holding, Trade, TradeStatus, TradeZone};

/// Filter set for one dashboard request. None means "All" for each axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<TradeStatus>,
    pub trade_zone: Option<TradeZone>,
    pub trade_type: Option<String>,
    pub range: Option<RangeBucket>,
}

/// One dashboard row: the trade plus everything derived for display.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRow {
    pub trade: Trade,
    pub distance_pct: f64,
    pub alert_label: Option<AlertLabel>,
    pub chart_url: String,
    pub reference_link: Option<String>,
}

/// Request-scoped view model. Built fresh per request, no process-wide state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub rows: Vec<TradeRow>,
}

/// Assemble the dashboard from an already-loaded trade set. Pure so it can
/// be driven by any store.
pub fn assemble_dashboard(
    trades: Vec<Trade>,
    links: &HashMap<String, String>,
    query: &DashboardQuery,
) -> DashboardView {
    let mut rows: Vec<TradeRow> = trades
        .into_iter()
        .filter(|t| query.status.map_or(true, |s| t.status == s))
        .filter(|t| query.trade_zone.map_or(true, |z| t.trade_zone == z))
        .filter(|t| {
            query
                .trade_type
                .as_ref()
                .map_or(true, |ty| &t.trade_type == ty)
        })
        .map(|trade| {
            let proximity = alerts::classify(&trade);
            let normalized = symbols::normalize(&trade.stock_name);
            TradeRow {
                chart_url: symbols::chart_url(&trade.stock_name),
                reference_link: links.get(&normalized).cloned(),
                distance_pct: proximity.distance_pct,
                alert_label: proximity.label,
                trade,
            }
        })
        .filter(|row| query.range.map_or(true, |b| b.contains(row.distance_pct)))
        .collect();

    // Closest to entry first; the undefined-distance sentinel sorts last
    rows.sort_by(|a, b| {
        a.distance_pct
            .partial_cmp(&b.distance_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.trade.id.cmp(&b.trade.id))
    });

    DashboardView { rows }
}

/// Active trades only.
pub fn live_view(trades: Vec<Trade>) -> Vec<Trade> {
    trades
        .into_iter()
        .filter(|t| t.status == TradeStatus::Active)
        .collect()
}

/// Closed trades only (Target-Hit / SL-Hit).
pub fn history_view(trades: Vec<Trade>) -> Vec<Trade> {
    trades
        .into_iter()
        .filter(|t| t.status.is_terminal())
        .collect()
}

/// Portfolio watch row: the holding plus its band classification.
#[derive(Debug, Clone, Serialize)]
pub struct HoldingRow {
    pub holding: Holding,
    pub cost_in_band: bool,
}

pub fn portfolio_view(holdings: Vec<Holding>) -> Vec<HoldingRow> {
    holdings
        .into_iter()
        .map(|holding| HoldingRow {
            cost_in_band: holding.cost_in_band(),
            holding,
        })
        .collect()
}
