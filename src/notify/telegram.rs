use async_trait::async_trait;
use serde_json::json;

use super::AlertSink;

const BOT_TOKEN_ENV: &str = "ZONEWATCH_TELEGRAM_BOT_TOKEN";
const CHAT_IDS_ENV: &str = "ZONEWATCH_TELEGRAM_CHAT_IDS";

const API_BASE: &str = "https://api.telegram.org";

/// Delivers alert text to one or more Telegram chats through the Bot API.
/// Transport failures are logged and swallowed; an unreachable Telegram must
/// never stall a refresh cycle.
pub struct TelegramNotifier {
    api_base: String,
    bot_token: String,
    chat_ids: Vec<String>,
    http_client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_ids: Vec<String>) -> Self {
        Self::with_api_base(API_BASE.to_string(), bot_token, chat_ids)
    }

    pub fn with_api_base(api_base: String, bot_token: String, chat_ids: Vec<String>) -> Self {
        Self {
            api_base,
            bot_token,
            chat_ids,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build a notifier from the environment. Returns None when the bot token
    /// or chat list is absent, in which case alerting is popup-only.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var(BOT_TOKEN_ENV).ok()?;
        let chat_ids: Vec<String> = std::env::var(CHAT_IDS_ENV)
            .ok()?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if bot_token.is_empty() || chat_ids.is_empty() {
            return None;
        }

        Some(Self::new(bot_token, chat_ids))
    }

    async fn post_message(&self, chat_id: &str, text: &str) -> Result<(), reqwest::Error> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        self.http_client
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn send(&self, text: &str) {
        for chat_id in &self.chat_ids {
            if let Err(e) = self.post_message(chat_id, text).await {
                log::warn!("Telegram delivery to chat {} failed: {}", chat_id, e);
            }
        }
    }
}
