use serde::{Deserialize, Deserializer};

use crate::models::responder::ResponderStatus;

/// Inbound stream messages, discriminated by the `type` field. Anything with
/// an unrecognized type or a shape that does not parse is dropped upstream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    #[serde(rename = "SOS")]
    AlertCreated(AlertCreatedEvent),
    #[serde(rename = "resqrs")]
    ResponderPosition(ResponderPositionEvent),
}

#[derive(Debug, Deserialize)]
pub struct AlertCreatedEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ResponderPositionEvent {
    pub id: String,
    #[serde(default, rename = "rname")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub lon: Option<f64>,
    pub status: ResponderStatus,
    /// When present, the stream is authoritative over any locally committed
    /// assignment state.
    #[serde(default)]
    pub assigned_operations: Option<Vec<String>>,
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}
