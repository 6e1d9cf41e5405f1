//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `strict_rate_limiter`: checkout, review posting, and the assistant (~6/min)
//! - `relaxed_rate_limiter`: catalog, cart, and wishlist (~120/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client IP, most trusted first.
const CLIENT_IP_HEADERS: [&str; 4] = [
    "cf-connecting-ip",
    "fly-client-ip",
    "x-forwarded-for",
    "x-real-ip",
];

/// Key extractor for Cloudflare in front of Fly.io.
///
/// Reads the client IP from proxy headers; `x-forwarded-for` contributes its
/// first hop. Falls back to the peer address when no proxy header is present.
#[derive(Clone, Copy)]
pub struct CloudflareIpKeyExtractor;

impl CloudflareIpKeyExtractor {
    fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
        CLIENT_IP_HEADERS.iter().find_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
    }
}

impl tower_governor::key_extractor::KeyExtractor for CloudflareIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        Self::client_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|info| info.0.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<CloudflareIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Limiter for expensive or abusable endpoints: one token every 10 seconds,
/// burst of 5.
///
/// # Panics
///
/// Does not panic: `per_second(10)` and `burst_size(5)` are non-zero, which
/// is all `GovernorConfigBuilder::finish` checks.
#[must_use]
pub fn strict_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(CloudflareIpKeyExtractor)
        .per_second(10)
        .burst_size(5)
        .finish()
        .expect("strict limiter uses non-zero period and burst");
    GovernorLayer::new(Arc::new(config))
}

/// Limiter for browsing: two tokens per second, burst of 60.
///
/// # Panics
///
/// Does not panic: `per_millisecond(500)` and `burst_size(60)` are non-zero.
#[must_use]
pub fn relaxed_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(CloudflareIpKeyExtractor)
        .per_millisecond(500)
        .burst_size(60)
        .finish()
        .expect("relaxed limiter uses non-zero period and burst");
    GovernorLayer::new(Arc::new(config))
}
