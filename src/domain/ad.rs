//! The durable `Ad` record and the small closed-set enums derived around it
//! (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Low,
    Mass,
    Affluent,
    Hnw,
}

impl Segment {
    /// Derives the wealth segment from an account balance (spec §3) using
    /// the default segment thresholds (50k/200k/1M).
    ///
    /// The four-segment closed set is authoritative (see DESIGN.md open
    /// question: one variant of the source helper fell through without a
    /// return for the top bracket — that variant is not reproduced here).
    pub fn from_balance(balance: f64) -> Self {
        Self::from_balance_with_thresholds(balance, &crate::config::settings::SegmentThresholds::default())
    }

    /// Same derivation, against configurable thresholds (spec §6's
    /// "segment thresholds (50k/200k/1M)" tunable).
    pub fn from_balance_with_thresholds(
        balance: f64,
        thresholds: &crate::config::settings::SegmentThresholds,
    ) -> Self {
        if balance < thresholds.mass {
            Segment::Low
        } else if balance < thresholds.affluent {
            Segment::Mass
        } else if balance < thresholds.hnw {
            Segment::Affluent
        } else {
            Segment::Hnw
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Low => "low",
            Segment::Mass => "mass",
            Segment::Affluent => "affluent",
            Segment::Hnw => "hnw",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Channel {
    #[serde(rename = "ATM")]
    Atm,
    #[serde(rename = "mobile")]
    Mobile,
    #[serde(rename = "web")]
    Web,
    #[serde(rename = "USSD")]
    Ussd,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Atm => "ATM",
            Channel::Mobile => "mobile",
            Channel::Web => "web",
            Channel::Ussd => "USSD",
        }
    }

    /// Unrecognised channel strings are accepted by the orchestrator and
    /// simply yield no catalog matches (spec §4.8 step 1); this parse is
    /// therefore only used where a known channel is required (cache keys,
    /// catalog filters), never for request validation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ATM" => Some(Channel::Atm),
            "mobile" => Some(Channel::Mobile),
            "web" => Some(Channel::Web),
            "USSD" => Some(Channel::Ussd),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeSlot {
    /// Derives the named time slot from an hour-of-day (0..24), per spec §3:
    /// morning [6,12), afternoon [12,17), evening [17,21), night [21,24)∪[0,6).
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeSlot::Morning,
            12..=16 => TimeSlot::Afternoon,
            17..=20 => TimeSlot::Evening,
            _ => TimeSlot::Night,
        }
    }

    pub fn of(now: DateTime<Utc>) -> Self {
        use chrono::Timelike;
        Self::from_hour(now.hour())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertiser {
    pub name: String,
    #[serde(rename = "contactEmail")]
    pub contact_email: String,
}

/// Durable ad record (spec §3). `impressions`/`clicks` are maintained by the
/// catalog adapter's atomic increment operations, never mutated in place
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub title: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "videoUrl", skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    pub segments: Vec<Segment>,
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(rename = "timeSlots", skip_serializing_if = "Option::is_none")]
    pub time_slots: Option<Vec<TimeSlot>>,
    #[serde(rename = "startDate")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "endDate")]
    pub end_date: DateTime<Utc>,
    pub status: AdStatus,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertiser: Option<Advertiser>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::Atm]
}

fn default_priority() -> f64 {
    1.0
}

impl Ad {
    /// Boundary validation for `createAd` (spec §3 invariants, expanded in
    /// SPEC_FULL §11): non-empty segments, `startDate <= endDate`, positive
    /// priority.
    pub fn validate(&self) -> Result<(), String> {
        if self.segments.is_empty() {
            return Err("segments must be non-empty".into());
        }
        if self.start_date > self.end_date {
            return Err("startDate must be <= endDate".into());
        }
        if self.priority <= 0.0 {
            return Err("priority must be positive".into());
        }
        Ok(())
    }

    /// The channels used for cache-invalidation fan-out, defaulting to
    /// `{ATM}` when absent, per SPEC_FULL §11 (the source left this
    /// unnormalised; we normalise here rather than at every call site).
    pub fn channels_or_default(&self) -> &[Channel] {
        const DEFAULT: [Channel; 1] = [Channel::Atm];
        if self.channels.is_empty() {
            &DEFAULT
        } else {
            &self.channels
        }
    }
}
