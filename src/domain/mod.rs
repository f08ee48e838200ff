pub mod ad;
pub mod profile;
pub mod serve;

pub use ad::{Ad, AdStatus, Advertiser, Channel, Segment, TimeSlot};
pub use profile::{ImpressionRecord, UserProfile};
pub use serve::{ClickRequest, ImpressionRequest, ServeRequest, ServeResponse};
