use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::{HeaderName, HeaderValue};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, services::ServeDir, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    api::{
        handler::{get_settings, get_status, health_check, save_settings, start_bot, stop_bot},
        websocket::event_stream,
        AppState,
    },
    error::AppResult,
    middleware::{create_cors_layer, rate_limit_middleware, ApiRateLimiter},
};

pub fn create_app(state: AppState) -> AppResult<Router> {
    info!("⚙️ Setting up HTTP routes...");

    let limiter = ApiRateLimiter::per_minute(state.config.api_rate_limit)?;
    let cors = create_cors_layer(&state.config.cors_origins);
    let public_dir = state.config.public_dir.clone();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(event_stream))
        .nest(
            "/api",
            Router::new()
                .route("/start", post(start_bot))
                .route("/stop", post(stop_bot))
                .route("/status", get(get_status))
                .route("/settings", get(get_settings).post(save_settings))
                .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware)),
        )
        // panel assets
        .fallback_service(ServeDir::new(public_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                )),
        )
        .with_state(state);

    info!("✓ HTTP routes configured");
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::test_state;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(&dir)).unwrap();

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["bot_running"], false);
    }

    #[tokio::test]
    async fn test_status_shape() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(&dir)).unwrap();

        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["isRunning"], false);
        assert_eq!(json["cursor"], 0);
        assert_eq!(json["accounts"], 0);
        assert_eq!(json["cyclesCompleted"], 0);
    }

    #[tokio::test]
    async fn test_start_without_settings_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(&dir)).unwrap();

        let response = app
            .oneshot(Request::post("/api/start").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "INVALID_ADDRESS");
    }

    #[tokio::test]
    async fn test_save_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(&dir)).unwrap();

        let body = serde_json::json!({
            "receiverAddress": "GDRXE2BQUC3AZNPVFSCEZ76NJ3WWL25FYFK6RGZGIEKWE4SOOHSUJUJ6",
            "memo": "PiBot Panel",
            "token": "",
            "chatId": "",
            "phrases": "one\ntwo\n"
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/settings")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/api/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["memo"], "PiBot Panel");
        assert_eq!(json["phrases"], "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_api_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(&dir);
        let mut config = (*state.config).clone();
        config.api_rate_limit = 1;
        state.config = std::sync::Arc::new(config);
        let app = create_app(state).unwrap();

        let first = app
            .clone()
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
