use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub id: i32,
    /// Seconds between automatic refresh cycles.
    pub refresh_interval_secs: i64,
    pub auto_refresh_enabled: bool,
    pub alerts_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsInput {
    pub refresh_interval_secs: Option<i64>,
    pub auto_refresh_enabled: Option<bool>,
    pub alerts_enabled: Option<bool>,
}
