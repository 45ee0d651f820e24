pub mod telegram;

use async_trait::async_trait;

use crate::engine::alerts::AlertLabel;
use crate::models::Trade;

pub use telegram::TelegramNotifier;

/// Notification seam. Delivery is fire-and-forget: implementations log
/// transport failures and never surface them to the refresh cycle.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, text: &str);
}

/// Alert message in the format the notification channel expects.
pub fn format_alert_message(trade: &Trade, label: AlertLabel) -> String {
    format!(
        "🚀 *STOCK ALERT: {}*\n⚠️ Status: {}\n💰 CMP: {}\n🎯 Entry: {}\n📊 Type: {}",
        trade.stock_name,
        label.as_str(),
        trade.cmp,
        trade.entry,
        trade.trade_type
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TradeStatus, TradeZone};

    #[test]
    fn test_alert_message_format() {
        let trade = Trade {
            id: 7,
            stock_name: "TCS".to_string(),
            cmp: 100.0,
            entry: 100.5,
            stop_loss: 95.0,
            target: 120.0,
            remark: String::new(),
            trade_type: "WIT".to_string(),
            dv_analysis: String::new(),
            trade_zone: TradeZone::Demand,
            trigger_date: None,
            exit_date: None,
            status: TradeStatus::Pending,
            last_alert: String::new(),
            created_at: 0,
            updated_at: 0,
        };

        let message = format_alert_message(&trade, AlertLabel::WithinHalfPercent);
        assert!(message.contains("STOCK ALERT: TCS"));
        assert!(message.contains("Status: Within 0.5% Range"));
        assert!(message.contains("CMP: 100"));
        assert!(message.contains("Entry: 100.5"));
        assert!(message.contains("Type: WIT"));
    }
}
