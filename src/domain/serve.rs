//! Wire shapes for the serve call (spec §6).

use super::ad::{Ad, Channel, Segment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ServeRequest {
    pub balance: f64,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(rename = "customerId")]
    pub customer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeResponse {
    #[serde(rename = "adId")]
    pub ad_id: String,
    pub title: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "videoUrl", skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    pub segment: Segment,
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

impl ServeResponse {
    pub fn from_ad(ad: &Ad, segment: Segment, channel: Channel, fallback: bool) -> Self {
        Self {
            ad_id: ad.id.clone(),
            title: ad.title.clone(),
            image_url: ad.image_url.clone(),
            video_url: ad.video_url.clone(),
            cta: ad.cta.clone(),
            segment,
            channel,
            fallback: fallback.then_some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImpressionRequest {
    #[serde(rename = "adId")]
    pub ad_id: String,
    #[serde(rename = "customerId", default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickRequest {
    #[serde(rename = "adId")]
    pub ad_id: String,
}
