//! Dual-layer rate-limit middleware (spec §4.7): admits per-IP first, then
//! per-API-key-tier, denying with `429` and the documented headers. Wraps
//! every route the way the teacher's `Metrics`/`PathLogger` wrap the app,
//! but — unlike those — can short-circuit the request.

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::HeaderValue;
use actix_web::{Error, HttpResponse};

use crate::config::settings::Settings;
use crate::engine::rate_limiter::{admit, Admission};
use crate::middleware::api_key::{bucket_suffix, resolve_tier, API_KEY_HEADER};
use crate::ports::kv::KvPort;
use crate::utils::clock::Clock;
use crate::utils::random::SuffixGen;

#[derive(Clone)]
pub struct RateLimit {
    kv: Arc<dyn KvPort>,
    clock: Arc<dyn Clock>,
    suffix_gen: Arc<dyn SuffixGen>,
    settings: Arc<Settings>,
}

impl RateLimit {
    pub fn new(
        kv: Arc<dyn KvPort>,
        clock: Arc<dyn Clock>,
        suffix_gen: Arc<dyn SuffixGen>,
        settings: Arc<Settings>,
    ) -> Self {
        Self { kv, clock, suffix_gen, settings }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            kv: self.kv.clone(),
            clock: self.clock.clone(),
            suffix_gen: self.suffix_gen.clone(),
            settings: self.settings.clone(),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    kv: Arc<dyn KvPort>,
    clock: Arc<dyn Clock>,
    suffix_gen: Arc<dyn SuffixGen>,
    settings: Arc<Settings>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let kv = self.kv.clone();
        let clock = self.clock.clone();
        let suffix_gen = self.suffix_gen.clone();
        let rate_limits = self.settings.rate_limits;

        let ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let path = req.path().to_string();
        let api_key = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Box::pin(async move {
            let ip_admission =
                admit(kv.as_ref(), clock.as_ref(), suffix_gen.as_ref(), "ip", &ip, &path, rate_limits.per_ip).await;
            if !ip_admission.allowed {
                return Ok(denial_response(req, &ip_admission, rate_limits.per_ip.max_requests, None));
            }

            // The per-API-key layer only applies "when an API key is present"
            // (spec §4.7) — anonymous callers are governed by the IP layer alone.
            let tightest = if let Some(key) = api_key.as_deref() {
                let tier = resolve_tier(kv.as_ref(), Some(key)).await;
                let tier_window = rate_limits.for_tier(&tier);
                let tier_admission = admit(
                    kv.as_ref(),
                    clock.as_ref(),
                    suffix_gen.as_ref(),
                    "apikey",
                    &bucket_suffix(key),
                    &path,
                    tier_window,
                )
                .await;
                if !tier_admission.allowed {
                    return Ok(denial_response(req, &tier_admission, tier_window.max_requests, Some(tier)));
                }
                (tier_window.max_requests, tier_admission.remaining)
            } else {
                (rate_limits.per_ip.max_requests, ip_admission.remaining)
            };

            let res = service.call(req).await?;
            let mut res = res.map_into_boxed_body();
            let headers = res.headers_mut();
            if let Ok(limit) = HeaderValue::from_str(&tightest.0.to_string()) {
                headers.insert(actix_web::http::header::HeaderName::from_static("x-ratelimit-limit"), limit);
            }
            if let Ok(remaining) = HeaderValue::from_str(&tightest.1.to_string()) {
                headers.insert(
                    actix_web::http::header::HeaderName::from_static("x-ratelimit-remaining"),
                    remaining,
                );
            }
            Ok(res)
        })
    }
}

fn denial_response(
    req: ServiceRequest,
    admission: &Admission,
    limit: u64,
    tier: Option<String>,
) -> ServiceResponse<BoxBody> {
    let body = serde_json::json!({
        "error": "rate limited",
        "retryAfter": admission.retry_after_secs,
        "tier": tier,
    });
    let response = HttpResponse::TooManyRequests()
        .insert_header(("Retry-After", admission.retry_after_secs.to_string()))
        .insert_header(("X-RateLimit-Limit", limit.to_string()))
        .insert_header(("X-RateLimit-Remaining", "0"))
        .json(body);
    req.into_response(response).map_into_boxed_body()
}
