pub mod ids;
pub mod time;

pub use ids::{AllianceId, CharacterId, CorporationId, FactionId};
pub use time::Timestamp;
