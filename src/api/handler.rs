use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::{info, warn};
use validator::Validate;

use super::models::*;
use crate::{
    config::Config,
    error::{AppError, AppResult},
    events::{BotStatus, EventBroadcaster, LogLevel},
    notify::TelegramNotifier,
    settings::{Settings, SettingsStore},
    sweep::{parse_address, BotHandle, SweepJob, TransactionComposer},
};

#[derive(Clone)]
pub struct AppState {
    pub bot: BotHandle,
    pub settings: Arc<SettingsStore>,
    pub notifier: Arc<TelegramNotifier>,
    pub events: EventBroadcaster,
    pub config: Arc<Config>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        bot_running: state.bot.status().is_running,
        telegram_enabled: state.notifier.is_enabled(),
    })
}

/// Starts the bot with the saved recipient, memo and phrases
/// POST /api/start
pub async fn start_bot(State(state): State<AppState>) -> AppResult<Json<ActionResponse>> {
    info!("[API] Start requested");

    let settings = state.settings.load().await?;
    let job = build_job(&state.config, &settings).map_err(|e| {
        warn!("[API] Cannot start bot: {}", e);
        state
            .events
            .log(LogLevel::Error, format!("Cannot start bot: {}", e));
        e
    })?;

    let accounts = job.account_count();
    if !state.bot.start(job).await? {
        return Ok(Json(ActionResponse::ok("Bot is already running.")));
    }

    Ok(Json(ActionResponse::ok(format!(
        "Bot started with {} account(s).",
        accounts
    ))))
}

/// POST /api/stop
pub async fn stop_bot(State(state): State<AppState>) -> AppResult<Json<ActionResponse>> {
    info!("[API] Stop requested");

    if !state.bot.stop().await? {
        return Ok(Json(ActionResponse::ok("Bot is not running.")));
    }
    Ok(Json(ActionResponse::ok("Bot stopped.")))
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<BotStatus> {
    Json(state.bot.status())
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> AppResult<Json<Settings>> {
    Ok(Json(state.settings.load().await?))
}

/// Persists the settings form and applies the new Telegram credentials
/// POST /api/settings
pub async fn save_settings(
    State(state): State<AppState>,
    Json(request): Json<SaveSettingsRequest>,
) -> AppResult<Json<ActionResponse>> {
    if state.bot.status().is_running {
        return Err(AppError::BotRunning(
            "Stop the bot before changing settings.".to_string(),
        ));
    }

    request.validate()?;
    let settings = Settings::from(request);

    state.settings.save(&settings).await?;
    state
        .notifier
        .reconfigure(&settings.telegram_token, &settings.telegram_chat_id);

    info!("[API] Settings saved");
    state.events.log(LogLevel::Info, "Settings saved");
    Ok(Json(ActionResponse::ok("Settings saved.")))
}

fn build_job(config: &Config, settings: &Settings) -> AppResult<SweepJob> {
    let recipient = settings.receiver_address.trim();
    if recipient.is_empty() {
        return Err(AppError::InvalidAddress(
            "RECEIVER_ADDRESS is not set.".to_string(),
        ));
    }
    parse_address(recipient).map_err(|_| {
        AppError::InvalidAddress("RECEIVER_ADDRESS is not a valid account address.".to_string())
    })?;

    let phrases = settings.phrase_list();
    if phrases.is_empty() {
        return Err(AppError::InvalidInput("The phrases file is empty.".to_string()));
    }

    let composer = TransactionComposer::new(
        &config.network_passphrase,
        recipient,
        settings.effective_memo(),
    )?;
    SweepJob::new(phrases, composer)
}
