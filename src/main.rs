mod api;
mod bootstrap;
mod config;
mod error;
mod events;
mod horizon;
mod middleware;
mod notify;
mod server;
mod settings;
mod sweep;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::notify::NotificationSink;

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,pi_sweeper=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting Pi sweeper control panel");

    let config = config::Config::from_env().context("invalid configuration")?;
    let bind_address = config.bind_address.clone();

    let state = bootstrap::initialize_app_state(config)
        .await
        .context("failed to initialize application state")?;
    let notifier = state.notifier.clone();

    let app = server::create_app(state).context("failed to build router")?;

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    info!("🌐 Panel available at http://{}", bind_address);
    notifier.notify("🖥️ *Server Panel Online*".to_string());

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
