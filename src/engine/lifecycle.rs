use chrono::{DateTime, Local};

use crate::models::{Trade, TradeStatus, TradeZone};

/// Stored format for trigger/exit timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    None,
    Triggered,
    Exited,
}

/// Outcome of evaluating one trade against one price. At most one transition
/// happens per evaluation: a trade triggered this cycle is not exit-checked
/// until the next one.
#[derive(Debug, Clone)]
pub struct Transition {
    pub status: TradeStatus,
    pub trigger_date: Option<String>,
    pub exit_date: Option<String>,
    pub kind: TransitionKind,
}

impl Transition {
    fn unchanged(status: TradeStatus) -> Self {
        Self {
            status,
            trigger_date: None,
            exit_date: None,
            kind: TransitionKind::None,
        }
    }

    pub fn changed(&self) -> bool {
        self.kind != TransitionKind::None
    }
}

/// Advance a trade's lifecycle given the latest price.
///
/// Pending trades activate when price reaches the entry (at-or-below for
/// DEMAND, at-or-above for SUPPLY). Active trades exit on target or
/// stop-loss, target checked first when both hold. A zero entry, target or
/// stop-loss means "not set" and the condition never fires. Terminal trades
/// are never touched.
pub fn evaluate(trade: &Trade, latest_price: f64, now: DateTime<Local>) -> Transition {
    if trade.status.is_terminal() {
        return Transition::unchanged(trade.status);
    }

    match trade.status {
        TradeStatus::Pending => {
            let triggered = trade.entry > 0.0
                && match trade.trade_zone {
                    TradeZone::Demand => latest_price <= trade.entry,
                    TradeZone::Supply => latest_price >= trade.entry,
                };

            if triggered {
                Transition {
                    status: TradeStatus::Active,
                    trigger_date: Some(now.format(TIMESTAMP_FORMAT).to_string()),
                    exit_date: None,
                    kind: TransitionKind::Triggered,
                }
            } else {
                Transition::unchanged(TradeStatus::Pending)
            }
        }
        TradeStatus::Active => {
            // Exit conditions apply only once a trigger timestamp exists;
            // a hand-edited Active row without one stays put.
            if trade.trigger_date.is_none() {
                return Transition::unchanged(TradeStatus::Active);
            }

            let exit_status = match trade.trade_zone {
                TradeZone::Demand => {
                    if trade.target > 0.0 && latest_price >= trade.target {
                        Some(TradeStatus::TargetHit)
                    } else if trade.stop_loss > 0.0 && latest_price <= trade.stop_loss {
                        Some(TradeStatus::SlHit)
                    } else {
                        None
                    }
                }
                TradeZone::Supply => {
                    if trade.target > 0.0 && latest_price <= trade.target {
                        Some(TradeStatus::TargetHit)
                    } else if trade.stop_loss > 0.0 && latest_price >= trade.stop_loss {
                        Some(TradeStatus::SlHit)
                    } else {
                        None
                    }
                }
            };

            match exit_status {
                Some(status) => Transition {
                    status,
                    trigger_date: None,
                    exit_date: Some(now.format(TIMESTAMP_FORMAT).to_string()),
                    kind: TransitionKind::Exited,
                },
                None => Transition::unchanged(TradeStatus::Active),
            }
        }
        // Unreachable, terminal states returned above
        status => Transition::unchanged(status),
    }
}
