use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    error::{AppError, AppResult},
    notify::NotificationSink,
};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Eq)]
struct TelegramCredentials {
    token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram bot notifier.
///
/// Disabled (every `notify` is a no-op) while the token or chat id is empty.
pub struct TelegramNotifier {
    api_base: String,
    client: reqwest::Client,
    credentials: RwLock<Option<TelegramCredentials>>,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, token: &str, chat_id: &str) -> Self {
        let notifier = Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            credentials: RwLock::new(None),
        };
        notifier.reconfigure(token, chat_id);
        notifier
    }

    /// Swaps credentials after the operator saves new settings
    pub fn reconfigure(&self, token: &str, chat_id: &str) {
        let token = token.trim();
        let chat_id = chat_id.trim();

        let credentials = if token.is_empty() || chat_id.is_empty() {
            warn!("[TELEGRAM] Token or chat id missing, notifications disabled");
            None
        } else {
            info!("[TELEGRAM] Notifications enabled");
            Some(TelegramCredentials {
                token: token.to_string(),
                chat_id: chat_id.to_string(),
            })
        };

        *self.credentials.write() = credentials;
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials.read().is_some()
    }

    async fn send_message(
        client: &reqwest::Client,
        api_base: &str,
        credentials: &TelegramCredentials,
        text: &str,
    ) -> AppResult<()> {
        let url = format!("{}/bot{}/sendMessage", api_base, credentials.token);
        let request = SendMessageRequest {
            chat_id: &credentials.chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };

        let response = client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body: TelegramResponse = response.json().await.unwrap_or(TelegramResponse {
            ok: false,
            description: None,
        });

        if !status.is_success() || !body.ok {
            return Err(AppError::ExternalError(format!(
                "Telegram API error ({}): {}",
                status,
                body.description.unwrap_or_default()
            )));
        }

        Ok(())
    }
}

impl NotificationSink for TelegramNotifier {
    fn notify(&self, message: String) {
        let Some(credentials) = self.credentials.read().clone() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[TELEGRAM] No runtime available, dropping notification");
            return;
        };

        let client = self.client.clone();
        let api_base = self.api_base.clone();
        runtime.spawn(async move {
            if let Err(e) = Self::send_message(&client, &api_base, &credentials, &message).await {
                error!("[TELEGRAM] Failed to send notification: {}", e);
            }
        });
    }
}
