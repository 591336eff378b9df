use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An incoming SOS report. Coordinates are immutable once created; alerts
/// accumulate for the whole monitoring session and are only cleared by the
/// operator, outside this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub lat: f64,
    pub lon: f64,
    /// Human-readable place name from reverse geocoding, display only.
    pub location_name: String,
    pub ticket_status: String,
    pub created_at: DateTime<Utc>,
}
