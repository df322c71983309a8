use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    settings::Settings,
    sweep::{parse_address, MAX_MEMO_BYTES},
};

// ========== REQUEST MODELS ==========

/// Settings form submitted from the panel
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveSettingsRequest {
    #[serde(default)]
    #[validate(custom = "validate_receiver_address")]
    pub receiver_address: String,

    #[serde(default)]
    #[validate(custom = "validate_memo")]
    pub memo: String,

    #[serde(default, rename = "token")]
    pub telegram_token: String,

    #[serde(default, rename = "chatId")]
    pub telegram_chat_id: String,

    /// Raw phrases file content, one phrase per line
    #[serde(default)]
    pub phrases: String,
}

impl From<SaveSettingsRequest> for Settings {
    fn from(request: SaveSettingsRequest) -> Self {
        Self {
            receiver_address: request.receiver_address.trim().to_string(),
            memo: request.memo.trim().to_string(),
            telegram_token: request.telegram_token.trim().to_string(),
            telegram_chat_id: request.telegram_chat_id.trim().to_string(),
            phrases: request.phrases,
        }
    }
}

/// Empty is accepted so the operator can save partial settings; start re-checks it
fn validate_receiver_address(address: &str) -> Result<(), ValidationError> {
    let address = address.trim();
    if address.is_empty() || parse_address(address).is_ok() {
        return Ok(());
    }
    Err(validation_error(
        "invalid_address",
        "must be a 56-character account address starting with G",
    ))
}

fn validate_memo(memo: &str) -> Result<(), ValidationError> {
    if memo.trim().len() > MAX_MEMO_BYTES {
        return Err(validation_error(
            "memo_too_long",
            "must be at most 28 bytes",
        ));
    }
    Ok(())
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

// ========== RESPONSE MODELS ==========

/// Result of a panel action (start, stop, save)
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub bot_running: bool,
    pub telegram_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPIENT: &str = "GDRXE2BQUC3AZNPVFSCEZ76NJ3WWL25FYFK6RGZGIEKWE4SOOHSUJUJ6";

    fn request(receiver: &str, memo: &str) -> SaveSettingsRequest {
        serde_json::from_value(serde_json::json!({
            "receiverAddress": receiver,
            "memo": memo,
            "token": "tok",
            "chatId": "42",
            "phrases": "a b c\n"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_request() {
        assert!(request(RECIPIENT, "PiBot Panel").validate().is_ok());
        assert!(request("", "").validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_address() {
        let errors = request("GNOTANADDRESS", "").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("receiver_address"));
    }

    #[test]
    fn test_rejects_long_memo() {
        let errors = request(RECIPIENT, &"m".repeat(29)).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("memo"));
    }

    #[test]
    fn test_into_settings_trims_fields() {
        let mut req = request(RECIPIENT, "  memo  ");
        req.telegram_chat_id = " 42 ".to_string();

        let settings = Settings::from(req);
        assert_eq!(settings.memo, "memo");
        assert_eq!(settings.telegram_chat_id, "42");
        assert_eq!(settings.telegram_token, "tok");
        assert_eq!(settings.phrases, "a b c\n");
    }
}
