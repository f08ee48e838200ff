// src/utils/errors.rs
//
// Error taxonomy for the serving pipeline (spec §7). `KVUnavailable` must
// never reach a handler as a response — every KV-dependent feature degrades
// internally instead (§5). It still exists as a variant because adapters
// need something to return from their trait methods.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("rate limited")]
    RateLimited {
        retry_after: u64,
        #[allow(dead_code)]
        limit: u64,
        tier: Option<String>,
    },
    #[error("no ad available")]
    NotFound,
    #[error("catalog timeout")]
    CatalogTimeout,
    #[error("kv unavailable: {0}")]
    KVUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// `NotFound`'s body shape uses `message`, not `error` (spec §6:
    /// `404 {message:"No ad available"}`), distinct from the `{error, ...}`
    /// shape every other error status uses.
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "retryAfter")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<String>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound => StatusCode::NOT_FOUND,
            // CatalogTimeout and Internal only ever reach a client when the
            // orchestrator's own outer fallback has also failed (§4.8).
            AppError::CatalogTimeout | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::KVUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(msg) => ErrorBody {
                error: Some(msg.clone()),
                message: None,
                retry_after: None,
                tier: None,
            },
            AppError::NotFound => ErrorBody {
                error: None,
                message: Some("No ad available".into()),
                retry_after: None,
                tier: None,
            },
            AppError::RateLimited { retry_after, tier, .. } => ErrorBody {
                error: Some("rate limited".into()),
                message: None,
                retry_after: Some(*retry_after),
                tier: tier.clone(),
            },
            other => ErrorBody {
                error: Some(other.to_string()),
                message: None,
                retry_after: None,
                tier: None,
            },
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Errors surfaced by the catalog port (§4.1).
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog query exceeded its soft deadline")]
    Timeout,
    #[error("catalog backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the KV port (§4.2). Every caller of the KV port is
/// expected to degrade on this rather than bubble it to the client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KvError {
    #[error("kv unavailable: {0}")]
    Unavailable(String),
    #[error("kv serialization error: {0}")]
    Serde(String),
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Timeout => AppError::CatalogTimeout,
            CatalogError::Backend(msg) => AppError::Internal(msg),
        }
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        match e {
            KvError::Unavailable(msg) => AppError::KVUnavailable(msg),
            KvError::Serde(msg) => AppError::KVUnavailable(msg),
        }
    }
}
