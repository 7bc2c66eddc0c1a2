//! Reverse geocoding: coordinate → address components.
//!
//! [`NominatimGeocoder`] queries an OpenStreetMap Nominatim `/reverse`
//! endpoint. [`StaticGeocoder`] returns a fixed [`Placemark`] and is used
//! when the geocoder is disabled or in tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use geomemories_core::Coordinate;

use crate::config::GeocoderConfig;

/// Address components for a location. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placemark {
    /// Short display form such as "Kyoto, Japan".
    pub city_with_context: Option<String>,
    pub region: Option<String>,
    pub name: Option<String>,
    pub thoroughfare: Option<String>,
    pub sub_thoroughfare: Option<String>,
    pub locality: Option<String>,
    pub sub_administrative_area: Option<String>,
    pub administrative_area: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Resolve the best placemark for `coordinate`, or `None` when the
    /// provider knows nothing about it.
    async fn reverse(&self, coordinate: Coordinate) -> Result<Option<Placemark>>;
}

pub struct StaticGeocoder {
    placemark: Option<Placemark>,
}

impl StaticGeocoder {
    pub fn new(placemark: Placemark) -> Self {
        Self {
            placemark: Some(placemark),
        }
    }

    pub fn empty() -> Self {
        Self { placemark: None }
    }
}

#[async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn reverse(&self, _coordinate: Coordinate) -> Result<Option<Placemark>> {
        Ok(self.placemark.clone())
    }
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    house_number: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    county: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    region: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

impl From<NominatimResponse> for Placemark {
    fn from(resp: NominatimResponse) -> Self {
        let addr = resp.address.unwrap_or_default();
        let locality = addr.city.or(addr.town).or(addr.village).or(addr.hamlet);
        let context = addr.state.clone().or_else(|| addr.country.clone());
        let city_with_context = match (&locality, &context) {
            (Some(city), Some(ctx)) => Some(format!("{}, {}", city, ctx)),
            (Some(city), None) => Some(city.clone()),
            _ => None,
        };

        Placemark {
            city_with_context,
            region: addr.region.or_else(|| addr.state.clone()),
            name: resp.name.filter(|n| !n.is_empty()),
            thoroughfare: addr.road,
            sub_thoroughfare: addr.house_number,
            locality,
            sub_administrative_area: addr.county.or(addr.state_district),
            administrative_area: addr.state,
            postal_code: addr.postcode,
            country: addr.country,
        }
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, coordinate: Coordinate) -> Result<Option<Placemark>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("addressdetails", "1".to_string()),
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
            ])
            .send()
            .await
            .context("Nominatim request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Nominatim error {}: {}", status, body_text);
        }

        let body: NominatimResponse = response
            .json()
            .await
            .context("Invalid Nominatim response")?;
        if let Some(err) = body.error {
            debug!(%coordinate, error = %err, "no placemark");
            return Ok(None);
        }
        Ok(Some(body.into()))
    }
}

/// Build the configured reverse geocoder.
pub fn create_geocoder(config: &GeocoderConfig) -> Result<Arc<dyn ReverseGeocoder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(StaticGeocoder::empty())),
        "nominatim" => Ok(Arc::new(NominatimGeocoder::new(config)?)),
        other => bail!("Unknown geocoder provider: {}", other),
    }
}
