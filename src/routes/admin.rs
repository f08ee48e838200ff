// src/routes/admin.rs
//
// Ad-mutation routes (spec §4.1, §6, SPEC_FULL §11): create, record
// impression, record click. Each is a thin wrapper over the catalog port;
// `create` additionally validates the ad and fans out a cache invalidation.

use std::sync::Arc;

use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::ad::Ad;
use crate::domain::serve::{ClickRequest, ImpressionRequest};
use crate::engine::cache;
use crate::ports::catalog::CatalogPort;
use crate::ports::kv::KvPort;
use crate::utils::errors::AppError;

#[derive(Serialize)]
struct Ack {
    success: bool,
}

#[post("/create")]
pub async fn create_ad(
    body: web::Json<Ad>,
    catalog: web::Data<Arc<dyn CatalogPort>>,
    kv: web::Data<Arc<dyn KvPort>>,
) -> Result<HttpResponse, AppError> {
    let mut ad = body.into_inner();
    if ad.id.trim().is_empty() {
        ad.id = Uuid::new_v4().to_string();
    }
    ad.validate().map_err(AppError::Validation)?;

    let segments = ad.segments.clone();
    let channels = ad.channels_or_default().to_vec();

    let created = catalog.create_ad(ad).await?;

    let kv = kv.into_inner();
    tokio::spawn(async move {
        cache::invalidate(kv.as_ref(), &segments, &channels, Utc::now()).await;
    });

    Ok(HttpResponse::Ok().json(created))
}

#[post("/impression")]
pub async fn record_impression(
    body: web::Json<ImpressionRequest>,
    catalog: web::Data<Arc<dyn CatalogPort>>,
) -> Result<HttpResponse, AppError> {
    if catalog.increment_impressions(&body.ad_id).await? {
        Ok(HttpResponse::Ok().json(Ack { success: true }))
    } else {
        Err(AppError::NotFound)
    }
}

#[post("/click")]
pub async fn record_click(
    body: web::Json<ClickRequest>,
    catalog: web::Data<Arc<dyn CatalogPort>>,
) -> Result<HttpResponse, AppError> {
    if catalog.increment_clicks(&body.ad_id).await? {
        Ok(HttpResponse::Ok().json(Ack { success: true }))
    } else {
        Err(AppError::NotFound)
    }
}

pub use create_ad as create_ad_service;
pub use record_click as record_click_service;
pub use record_impression as record_impression_service;
