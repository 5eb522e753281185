use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use citywatch_common::Address;
use serde::Deserialize;
use tracing::{debug, warn};

/// Longest address text sent to the geocoder.
pub const MAX_QUERY_CHARS: usize = 200;

/// A resolved address: coordinates plus whatever components the geocoder knows.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Address,
}

/// Geocoding collaborator. `Ok(None)` means no match; `Err` is a transport
/// or protocol failure.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedAddress>>;
}

// --- Nominatim ---

pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    pedestrian: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    quarter: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state_district: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    postcode: Option<String>,
}

impl NominatimAddress {
    fn into_address(self, formatted_address: String) -> Address {
        Address {
            formatted_address,
            house_number: self.house_number,
            street_name: self.road.or(self.pedestrian),
            area_name: self.suburb.or(self.neighbourhood).or(self.quarter),
            city: self.city.or(self.town).or(self.village),
            district: self.state_district.or(self.county),
            state: self.state,
            country: self.country,
            country_code: self.country_code.map(|c| c.to_uppercase()),
            postal_code: self.postcode,
        }
    }
}

impl NominatimResult {
    fn into_geocoded(self) -> Result<GeocodedAddress> {
        let latitude: f64 = self
            .lat
            .parse()
            .with_context(|| format!("Invalid latitude '{}' from Nominatim", self.lat))?;
        let longitude: f64 = self
            .lon
            .parse()
            .with_context(|| format!("Invalid longitude '{}' from Nominatim", self.lon))?;
        Ok(GeocodedAddress {
            latitude,
            longitude,
            address: self.address.into_address(self.display_name),
        })
    }
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(concat!("citywatch/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("Failed to build HTTP client")?,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedAddress>> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }
        if address.chars().count() > MAX_QUERY_CHARS {
            warn!(chars = address.chars().count(), "Address too long to geocode, skipping");
            return Ok(None);
        }

        let results: Vec<NominatimResult> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", address),
                ("format", "json"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .await
            .context("Nominatim request failed")?
            .error_for_status()
            .context("Nominatim returned an error status")?
            .json()
            .await
            .context("Failed to parse Nominatim response")?;

        match results.into_iter().next() {
            Some(first) => {
                let geocoded = first.into_geocoded()?;
                debug!(
                    address,
                    lat = geocoded.latitude,
                    lng = geocoded.longitude,
                    "Geocoded address"
                );
                Ok(Some(geocoded))
            }
            None => {
                debug!(address, "No geocoding results");
                Ok(None)
            }
        }
    }
}
