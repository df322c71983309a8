use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    api::AppState,
    config::Config,
    error::AppResult,
    events::EventBroadcaster,
    horizon::HorizonClient,
    notify::{telegram::TELEGRAM_API_BASE, TelegramNotifier},
    settings::SettingsStore,
    sweep::{BotHandle, SweepEngine},
};

pub async fn initialize_app_state(config: Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let settings = Arc::new(SettingsStore::new(
        config.settings_path.clone(),
        config.phrases_path.clone(),
    ));
    let saved = settings.load().await?;
    if saved.phrase_list().is_empty() {
        warn!(
            "⚠️  No seed phrases in {} - save settings before starting the bot",
            config.phrases_path.display()
        );
    }

    let notifier = Arc::new(TelegramNotifier::new(
        TELEGRAM_API_BASE,
        &saved.telegram_token,
        &saved.telegram_chat_id,
    ));

    let horizon = Arc::new(HorizonClient::new(&config.horizon_url, config.http_timeout())?);
    info!("✅ Horizon client ready: {}", config.horizon_url);

    let events = EventBroadcaster::new();
    let engine = Arc::new(SweepEngine::new(
        horizon,
        notifier.clone(),
        events.clone(),
        &config.explorer_tx_url,
    ));

    let (bot, _worker) = BotHandle::spawn(engine, config.sweep_pace());
    info!(
        "✅ Sweep worker spawned (pace {} ms between accounts)",
        config.sweep_pace_ms
    );

    Ok(AppState {
        bot,
        settings,
        notifier,
        events,
        config: Arc::new(config),
    })
}
