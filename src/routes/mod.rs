// src/routes/mod.rs
//
// Assembles the `/api/v1` resource tree. Split across two scopes sharing the
// same `/api/v1/ads` prefix because rate limiting applies unevenly across
// the ad-mutation routes (spec §6): `serve`, `impression`, and `click` are
// rate-limited, `create` is not (it's an operator/back-office call, not a
// customer-facing one).

pub mod admin;
pub mod health;
pub mod serve;

use actix_web::{web, Scope};

use crate::middleware::RateLimit;

pub use health::health_scope;

/// The rate-limited half of the ads API.
pub fn ads_limited_scope(rate_limit: RateLimit) -> Scope {
    web::scope("/api/v1/ads")
        .wrap(rate_limit)
        .service(serve::serve_ad)
        .service(admin::record_impression_service)
        .service(admin::record_click_service)
}

/// The unthrottled half of the ads API.
pub fn ads_unlimited_scope() -> Scope {
    web::scope("/api/v1/ads").service(admin::create_ad_service)
}
