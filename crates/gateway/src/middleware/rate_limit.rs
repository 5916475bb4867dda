//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use ragwise_common::{
    config::RateLimitConfig,
    errors::{AppError, Result},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide token bucket shared by every API route
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultDirectRateLimiter>,
    requests_per_second: u32,
}

impl RateLimit {
    /// `None` when rate limiting is disabled
    pub fn from_config(config: &RateLimitConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| AppError::Configuration {
            message: "rate_limit.requests_per_second must be positive".to_string(),
        })?;
        let burst = NonZeroU32::new(config.burst).ok_or_else(|| AppError::Configuration {
            message: "rate_limit.burst must be positive".to_string(),
        })?;

        let quota = Quota::per_second(per_second).allow_burst(burst);
        Ok(Some(Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            requests_per_second: config.requests_per_second,
        }))
    }

    fn check(&self) -> Result<()> {
        self.limiter.check().map_err(|_| AppError::RateLimited {
            limit: self.requests_per_second,
        })
    }
}

/// Reject the request with 429 once the bucket is empty
pub async fn rate_limit(State(limit): State<RateLimit>, request: Request, next: Next) -> Result<Response> {
    if let Err(e) = limit.check() {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        return Err(e);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests_per_second: u32, burst: u32, enabled: bool) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second,
            burst,
            enabled,
        }
    }

    #[test]
    fn test_burst_exhaustion() {
        let limit = RateLimit::from_config(&config(1, 2, true)).unwrap().unwrap();
        assert!(limit.check().is_ok());
        assert!(limit.check().is_ok());
        assert!(matches!(limit.check(), Err(AppError::RateLimited { limit: 1 })));
    }

    #[test]
    fn test_disabled_limiter() {
        assert!(RateLimit::from_config(&config(0, 0, false)).unwrap().is_none());
    }

    #[test]
    fn test_zero_quota_rejected() {
        assert!(matches!(
            RateLimit::from_config(&config(0, 10, true)),
            Err(AppError::Configuration { .. })
        ));
    }
}
