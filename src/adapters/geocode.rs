use crate::adapters::ensure_success;
use crate::domain::model::GeoPoint;
use crate::domain::ports::Geocoder;
use crate::utils::error::{LocatorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SOURCE: &str = "geocoder";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Google Geocoding API 風格的地址查詢
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: Client,
    api_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(client: Client, api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeoPoint> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;
        let body: GeocodeResponse = ensure_success(SOURCE, response).await?.json().await?;

        match body.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => {
                return Err(LocatorError::NotFound {
                    query: address.to_string(),
                })
            }
            other => {
                return Err(LocatorError::malformed(
                    SOURCE,
                    format!(
                        "status {}: {}",
                        other,
                        body.error_message.unwrap_or_default()
                    ),
                ))
            }
        }

        let location = body
            .results
            .first()
            .map(|r| &r.geometry.location)
            .ok_or_else(|| LocatorError::NotFound {
                query: address.to_string(),
            })?;

        GeoPoint::new(location.lat, location.lng)
    }
}
