use serde::{Deserialize, Serialize};

use crate::models::{Trade, TradeStatus};

/// Distance reported when a trade has no entry price. Sorts after every real
/// proximity value and never produces an alert.
pub const UNDEFINED_DISTANCE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLabel {
    TradeActive,
    WithinHalfPercent,
    WithinOnePercent,
}

impl AlertLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLabel::TradeActive => "Trade is Active",
            AlertLabel::WithinHalfPercent => "Within 0.5% Range",
            AlertLabel::WithinOnePercent => "Within 1% Range",
        }
    }
}

impl std::fmt::Display for AlertLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    /// Percent distance between current price and entry.
    pub distance_pct: f64,
    pub label: Option<AlertLabel>,
}

/// Classify a trade's alert state. An Active trade outranks any proximity
/// signal; otherwise distance to entry decides the label.
pub fn classify(trade: &Trade) -> Proximity {
    if trade.status == TradeStatus::Active {
        return Proximity {
            distance_pct: 0.0,
            label: Some(AlertLabel::TradeActive),
        };
    }

    if trade.entry == 0.0 {
        return Proximity {
            distance_pct: UNDEFINED_DISTANCE,
            label: None,
        };
    }

    let distance_pct = ((trade.cmp - trade.entry).abs() / trade.entry) * 100.0;

    let label = if distance_pct <= 0.5 {
        Some(AlertLabel::WithinHalfPercent)
    } else if distance_pct <= 1.0 {
        Some(AlertLabel::WithinOnePercent)
    } else {
        None
    };

    Proximity { distance_pct, label }
}

/// Dedup rule: dispatch only when there is a label and it differs from the
/// one last persisted for this trade. A later different label re-fires.
pub fn should_dispatch(label: Option<AlertLabel>, last_alert: &str) -> bool {
    match label {
        Some(label) => label.as_str() != last_alert,
        None => false,
    }
}

/// Dashboard proximity filter bucket. Buckets are 0.5% wide up to 3%, each
/// half-open (lower, upper] except the first which includes zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBucket {
    pub lower: f64,
    pub upper: f64,
}

impl RangeBucket {
    pub fn all() -> Vec<RangeBucket> {
        (0..6)
            .map(|i| RangeBucket {
                lower: i as f64 * 0.5,
                upper: (i + 1) as f64 * 0.5,
            })
            .collect()
    }

    pub fn contains(&self, distance_pct: f64) -> bool {
        if self.lower == 0.0 {
            distance_pct >= 0.0 && distance_pct <= self.upper
        } else {
            distance_pct > self.lower && distance_pct <= self.upper
        }
    }

    pub fn label(&self) -> String {
        if self.lower == 0.0 {
            format!("0 - {}%", self.upper)
        } else {
            format!("{}% - {}%", self.lower, self.upper)
        }
    }
}
