use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;

/// Reverse-geocoding collaborator (Nominatim). Display-only: the dispatch
/// engine never depends on a place name, so every failure path here degrades
/// to "no name" rather than an error the caller must handle.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

impl Geocoder {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.geocoder_url.clone(),
            enabled: config.geocoder_enabled,
        }
    }

    /// A geocoder that never issues requests; used in tests and when lookups
    /// are switched off by configuration.
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: String::new(),
            enabled: false,
        }
    }

    /// Best-effort place name for a coordinate pair.
    pub async fn reverse(&self, lat: f64, lon: f64) -> Option<String> {
        if !self.enabled {
            return None;
        }
        match self.lookup(lat, lon).await {
            Ok(name) => name,
            Err(e) => {
                debug!("Reverse geocoding failed for ({}, {}): {}", lat, lon, e);
                None
            }
        }
    }

    async fn lookup(&self, lat: f64, lon: f64) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_string()),
            ])
            .header(reqwest::header::USER_AGENT, "resq-dispatch/0.1")
            .timeout(Duration::from_secs(5))
            .send()
            .await?
            .error_for_status()?;

        let body: ReverseResponse = response.json().await?;
        Ok(body.display_name)
    }
}
