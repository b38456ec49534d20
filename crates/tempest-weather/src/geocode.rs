//! Forward geocoding: turn a place name into coordinates.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tempest_core::error::ReqwestErrorExt;
use tempest_core::{NetworkError, WeatherError};
use url::Url;

use crate::provider::GeocodeClient;
use crate::types::Coordinates;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "Tempest/0.1.0 (weather watch face)";

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: Url,
}

impl NominatimGeocoder {
    pub fn new() -> Result<Self, WeatherError> {
        let base_url = Url::parse(NOMINATIM_URL)
            .map_err(|e| WeatherError::Geocode(format!("Invalid geocoder URL: {}", e)))?;
        Self::with_base_url(base_url)
    }

    /// Point the client at another Nominatim instance
    pub fn with_base_url(base_url: Url) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self { client, base_url })
    }

    fn search_url(&self, location_name: &str) -> Result<Url, WeatherError> {
        let mut url = self
            .base_url
            .join("search")
            .map_err(|e| WeatherError::Geocode(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("q", location_name)
            .append_pair("format", "json")
            .append_pair("limit", "1");
        Ok(url)
    }
}

#[async_trait]
impl GeocodeClient for NominatimGeocoder {
    async fn lookup(&self, location_name: &str) -> Result<Option<Coordinates>, WeatherError> {
        let url = self.search_url(location_name)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Geocode returned status {}", status);
            return Err(WeatherError::Network(NetworkError::ServerError {
                status: status.as_u16(),
                message: format!("Nominatim search failed for '{}'", location_name),
            }));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let Some(place) = places.into_iter().next() else {
            tracing::info!("No geocoding match for '{}'", location_name);
            return Ok(None);
        };

        let parse = |value: &str| {
            value.parse::<f64>().map_err(|e| {
                WeatherError::Network(NetworkError::InvalidResponse(format!(
                    "Bad coordinate '{}': {}",
                    value, e
                )))
            })
        };
        let coordinates = Coordinates {
            latitude: parse(&place.lat)?,
            longitude: parse(&place.lon)?,
        };

        tracing::info!(
            "Geocoded '{}' to {}, {} ({})",
            location_name,
            coordinates.latitude,
            coordinates.longitude,
            place.display_name.as_deref().unwrap_or("unnamed place")
        );
        Ok(Some(coordinates))
    }
}
