use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponderStatus {
    #[serde(rename = "available")]
    Available,
    #[serde(rename = "in-op")]
    InOp,
    #[serde(rename = "offline")]
    Offline,
}

// Unknown status strings from the stream degrade to offline rather than
// dropping the whole position event.
impl<'de> Deserialize<'de> for ResponderStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "available" => ResponderStatus::Available,
            "in-op" => ResponderStatus::InOp,
            _ => ResponderStatus::Offline,
        })
    }
}

/// A rescue/patrol unit with a live position feed. Position has latest-wins
/// overwrite semantics; no history is retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responder {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub status: ResponderStatus,
    /// Alert ids currently assigned to this unit. Bounded by the configured
    /// concurrent-operations cap.
    pub assigned_operations: Vec<String>,
    /// True when status/assigned_operations were last written by a local
    /// assignment commit rather than by the stream. An inbound snapshot that
    /// carries its own assigned_operations is authoritative and clears it.
    #[serde(skip)]
    pub locally_assigned: bool,
}
