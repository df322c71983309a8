use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Process-wide limiter for the control API
#[derive(Clone)]
pub struct ApiRateLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl ApiRateLimiter {
    pub fn per_minute(requests: u32) -> AppResult<Self> {
        let requests = NonZeroU32::new(requests).ok_or_else(|| {
            AppError::Config("API_RATE_LIMIT must be greater than zero".to_string())
        })?;

        Ok(Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(requests))),
        })
    }

    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<ApiRateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if !limiter.check() {
        warn!("Rate limit exceeded for {}", req.uri().path());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            ApiRateLimiter::per_minute(0),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = ApiRateLimiter::per_minute(3).unwrap();

        assert!(limiter.check());
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
