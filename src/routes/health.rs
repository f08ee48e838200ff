// src/routes/health.rs
//
// Liveness check (SPEC_FULL §11): beyond a bare 200, surfaces the same
// availability flags the engine itself consults for degradation so an
// operator can see why serving might be running in a degraded mode.

use std::sync::Arc;

use actix_web::{get, web, HttpResponse, Scope};
use serde::Serialize;

use crate::ports::catalog::CatalogPort;
use crate::ports::kv::KvPort;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    #[serde(rename = "kvAvailable")]
    kv_available: bool,
    #[serde(rename = "catalogAvailable")]
    catalog_available: bool,
}

#[get("")]
async fn health_check(
    kv: web::Data<Arc<dyn KvPort>>,
    catalog: web::Data<Arc<dyn CatalogPort>>,
) -> HttpResponse {
    HttpResponse::Ok().json(HealthBody {
        status: "ok",
        kv_available: kv.is_available(),
        catalog_available: catalog.is_available(),
    })
}

pub fn health_scope() -> Scope {
    web::scope("/api/v1/health").service(health_check)
}
