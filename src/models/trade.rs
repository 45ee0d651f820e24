use serde::{Deserialize, Serialize};

/// Directional bias of a trade idea. DEMAND buys a support level and expects
/// price to rise; SUPPLY sells a resistance level and expects price to fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeZone {
    #[serde(rename = "DEMAND")]
    Demand,
    #[serde(rename = "SUPPLY")]
    Supply,
}

impl TradeZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeZone::Demand => "DEMAND",
            TradeZone::Supply => "SUPPLY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEMAND" => Some(TradeZone::Demand),
            "SUPPLY" => Some(TradeZone::Supply),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. Target-Hit and SL-Hit are terminal: a trade that reached
/// either is excluded from all further evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Active,
    #[serde(rename = "Target-Hit")]
    TargetHit,
    #[serde(rename = "SL-Hit")]
    SlHit,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "Pending",
            TradeStatus::Active => "Active",
            TradeStatus::TargetHit => "Target-Hit",
            TradeStatus::SlHit => "SL-Hit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Pending" => Some(TradeStatus::Pending),
            "Active" => Some(TradeStatus::Active),
            "Target-Hit" => Some(TradeStatus::TargetHit),
            "SL-Hit" => Some(TradeStatus::SlHit),
            _ => None,
        }
    }

    /// Blank and unknown stored values load as Pending. Older databases
    /// predate the status column entirely.
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or(TradeStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::TargetHit | TradeStatus::SlHit)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub stock_name: String,
    /// Last observed market price, overwritten on every refresh cycle.
    pub cmp: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub remark: String,
    /// Strategy bucket (QIT / MIT / WIT / DIT).
    pub trade_type: String,
    /// Chart link derived from the symbol on create/update.
    pub dv_analysis: String,
    pub trade_zone: TradeZone,
    /// Set exactly once, on Pending -> Active. Format "%Y-%m-%d %H:%M".
    pub trigger_date: Option<String>,
    /// Set exactly once, on Active -> Target-Hit / SL-Hit.
    pub exit_date: Option<String>,
    pub status: TradeStatus,
    /// Last dispatched alert label. Deduplication memo only, not a domain fact.
    pub last_alert: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTradeInput {
    pub stock_name: String,
    pub cmp: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub remark: String,
    pub trade_type: String,
    pub trade_zone: TradeZone,
}

/// Partial update for user edits. Lifecycle fields (status, timestamps,
/// last_alert) are owned by the refresh engine and not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTradeInput {
    pub stock_name: Option<String>,
    pub cmp: Option<f64>,
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub target: Option<f64>,
    pub remark: Option<String>,
    pub trade_type: Option<String>,
    pub trade_zone: Option<TradeZone>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilters {
    pub status: Option<TradeStatus>,
    pub trade_zone: Option<TradeZone>,
    pub trade_type: Option<String>,
}
