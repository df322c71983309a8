use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the panel API and service wiring
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Sweep error: {0}")]
    Sweep(#[from] SweepError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Bot is running: {0}")]
    BotRunning(String),

    #[error("External error: {0}")]
    ExternalError(String),
}

/// Per-account sweep errors.
///
/// `NoActionNeeded` is not represented here: an empty plan is a normal
/// outcome and surfaces as `SweepResult::NothingToDo`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    /// Phrase failed the mnemonic checksum. Never carries the phrase itself.
    #[error("Invalid seed phrase: {0}")]
    InvalidSeed(String),

    #[error("Account not activated (not found on the ledger): {0}")]
    AccountNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transaction rejected ({status}): {detail}")]
    SubmissionRejected {
        status: u16,
        detail: String,
        result_codes: Option<String>,
    },

    #[error("Transaction composition failed: {0}")]
    Compose(String),
}

impl SweepError {
    /// Message shown to the operator (notification channel and panel log).
    pub fn operator_message(&self) -> String {
        match self {
            SweepError::InvalidSeed(reason) => format!("Invalid seed phrase ({})", reason),
            SweepError::AccountNotFound(_) => {
                "Account not activated (not found on the ledger).".to_string()
            }
            SweepError::Network(message) => message.clone(),
            SweepError::SubmissionRejected { detail, .. } => detail.clone(),
            SweepError::Compose(message) => message.clone(),
        }
    }
}

/// Settings storage errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed settings file: {0}")]
    Parse(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::InvalidInput(message) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
            }
            AppError::InvalidAddress(message) => {
                (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", message)
            }
            AppError::BotRunning(message) => (StatusCode::BAD_REQUEST, "BOT_RUNNING", message),
            AppError::Sweep(SweepError::Compose(message)) => {
                (StatusCode::BAD_REQUEST, "INVALID_SWEEP_SETTINGS", message)
            }
            AppError::Settings(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SETTINGS_ERROR",
                e.to_string(),
            ),
            AppError::ExternalError(message) => {
                (StatusCode::BAD_GATEWAY, "EXTERNAL_ERROR", message)
            }
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                other.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");

        AppError::InvalidInput(format!("Validation failed: {}", message))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
