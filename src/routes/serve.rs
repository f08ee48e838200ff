// src/routes/serve.rs
//
// POST /api/v1/ads/serve (spec §4.8, §6). Thin adapter from the HTTP layer
// onto `engine::Orchestrator`, the way the teacher's `routes/trading.rs`
// handlers were thin adapters onto `services::trading_engine`.

use std::sync::Arc;

use actix_web::{post, web, HttpResponse};

use crate::config::settings::Settings;
use crate::domain::serve::ServeRequest;
use crate::engine::orchestrator::Orchestrator;
use crate::ports::catalog::CatalogPort;
use crate::ports::kv::KvPort;
use crate::utils::clock::Clock;
use crate::utils::errors::AppError;

#[post("/serve")]
pub async fn serve_ad(
    body: web::Json<ServeRequest>,
    catalog: web::Data<Arc<dyn CatalogPort>>,
    kv: web::Data<Arc<dyn KvPort>>,
    settings: web::Data<Settings>,
    clock: web::Data<Arc<dyn Clock>>,
) -> Result<HttpResponse, AppError> {
    let orchestrator = Orchestrator {
        catalog: catalog.as_ref().as_ref(),
        kv: kv.as_ref().as_ref(),
        settings: settings.as_ref(),
    };
    let response = orchestrator.serve(&body, clock.now()).await?;
    Ok(HttpResponse::Ok().json(response))
}
