use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Classification ---

/// Anomaly category. Serialized labels are a downstream contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EventType {
    #[serde(rename = "Structural Damage")]
    StructuralDamage,
    #[serde(rename = "Environmental Hazard")]
    EnvironmentalHazard,
    #[serde(rename = "Traffic Anomaly")]
    TrafficAnomaly,
    #[serde(rename = "Unusual Activity")]
    UnusualActivity,
    #[serde(rename = "Infrastructure Issue")]
    InfrastructureIssue,
    #[serde(rename = "Public Safety Concern")]
    PublicSafetyConcern,
    #[serde(rename = "Weather-Related Damage")]
    WeatherRelatedDamage,
    #[serde(rename = "Utility Disruption")]
    UtilityDisruption,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::StructuralDamage,
        EventType::EnvironmentalHazard,
        EventType::TrafficAnomaly,
        EventType::UnusualActivity,
        EventType::InfrastructureIssue,
        EventType::PublicSafetyConcern,
        EventType::WeatherRelatedDamage,
        EventType::UtilityDisruption,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EventType::StructuralDamage => "Structural Damage",
            EventType::EnvironmentalHazard => "Environmental Hazard",
            EventType::TrafficAnomaly => "Traffic Anomaly",
            EventType::UnusualActivity => "Unusual Activity",
            EventType::InfrastructureIssue => "Infrastructure Issue",
            EventType::PublicSafetyConcern => "Public Safety Concern",
            EventType::WeatherRelatedDamage => "Weather-Related Damage",
            EventType::UtilityDisruption => "Utility Disruption",
        }
    }

    /// What belongs in the category, as shown to the extraction model.
    pub fn guidance(&self) -> &'static str {
        match self {
            EventType::StructuralDamage => {
                "cracked buildings, broken bridges, deteriorating or collapsing structures"
            }
            EventType::EnvironmentalHazard => {
                "air, water or noise pollution, spills, illegal dumping, garbage pile-ups, fires in the open, landslides"
            }
            EventType::TrafficAnomaly => {
                "accidents, congestion, road blockages, illegal parking, malfunctioning traffic signals, metro delays"
            }
            EventType::UnusualActivity => {
                "suspicious gatherings, protests, unexpected objects, vandalism, stray animal alerts"
            }
            EventType::InfrastructureIssue => {
                "potholes, sinkholes, road cave-ins, broken streetlights, water pipe bursts, sewage blockages, construction debris"
            }
            EventType::PublicSafetyConcern => {
                "building fires, crime scenes, exposed wires, missing manhole covers, unsafe construction"
            }
            EventType::WeatherRelatedDamage => {
                "heavy rain flooding, waterlogging, storm damage, fallen trees, rain-driven sewage overflow"
            }
            EventType::UtilityDisruption => {
                "power outages, water supply interruptions, gas line issues, communication network failures"
            }
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventType {
    type Err = UnknownLabel;

    /// Accepts the canonical label ignoring case, spaces, hyphens and underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = fold_label(s);
        EventType::ALL
            .into_iter()
            .find(|t| fold_label(t.label()) == wanted)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = fold_label(s);
        Severity::ALL
            .into_iter()
            .find(|level| fold_label(level.label()) == wanted)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown label '{0}'")]
pub struct UnknownLabel(pub String);

fn fold_label(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// --- Location ---

/// Postal address of an anomaly. Only `formatted_address` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Address {
    /// Full human-readable address string.
    pub formatted_address: String,
    pub house_number: Option<String>,
    pub street_name: Option<String>,
    /// Locality or neighborhood.
    pub area_name: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Two-letter ISO country code (e.g. "IN").
    pub country_code: Option<String>,
    pub postal_code: Option<String>,
}

impl Address {
    /// Text suitable for a geocoding query: the formatted address, or the
    /// non-empty components joined most-specific first.
    pub fn query_text(&self) -> Option<String> {
        let formatted = self.formatted_address.trim();
        if !formatted.is_empty() {
            return Some(formatted.to_string());
        }
        let parts: Vec<&str> = self
            .components()
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    /// Fill empty fields from `other`, keeping everything already set.
    pub fn fill_missing_from(&mut self, other: &Address) {
        if self.formatted_address.trim().is_empty() {
            self.formatted_address = other.formatted_address.clone();
        }
        fill(&mut self.house_number, &other.house_number);
        fill(&mut self.street_name, &other.street_name);
        fill(&mut self.area_name, &other.area_name);
        fill(&mut self.city, &other.city);
        fill(&mut self.district, &other.district);
        fill(&mut self.state, &other.state);
        fill(&mut self.country, &other.country);
        fill(&mut self.country_code, &other.country_code);
        fill(&mut self.postal_code, &other.postal_code);
    }

    fn components(&self) -> [Option<&str>; 8] {
        [
            self.house_number.as_deref(),
            self.street_name.as_deref(),
            self.area_name.as_deref(),
            self.city.as_deref(),
            self.district.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
            self.country.as_deref(),
        ]
    }
}

fn fill(slot: &mut Option<String>, source: &Option<String>) {
    let empty = slot.as_deref().map_or(true, |s| s.trim().is_empty());
    if empty {
        if let Some(value) = source.as_deref().filter(|s| !s.trim().is_empty()) {
            *slot = Some(value.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(flatten)]
    pub address: Address,
}

// --- Report ---

/// One anomaly extracted from evidence. Immutable once emitted.
///
/// Serializes to the flat wire record consumed downstream: `unix_timestamp`,
/// `event_type`, `description`, `severity_level`, `latitude`, `longitude`,
/// `formatted_address` and nine nullable address components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnomalyReport {
    /// Seconds since the Unix epoch.
    #[serde(rename = "unix_timestamp")]
    pub timestamp: f64,
    pub event_type: EventType,
    pub description: String,
    #[serde(rename = "severity_level")]
    pub severity: Severity,
    #[serde(flatten)]
    pub location: GeoLocation,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportDefect {
    #[error("timestamp {0} is not a finite non-negative number")]
    Timestamp(f64),
    #[error("description is empty")]
    EmptyDescription,
    #[error("formatted_address is empty")]
    EmptyAddress,
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
}

impl AnomalyReport {
    /// Check the invariants every emitted report must satisfy.
    pub fn validate(&self) -> Result<(), ReportDefect> {
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(ReportDefect::Timestamp(self.timestamp));
        }
        if self.description.trim().is_empty() {
            return Err(ReportDefect::EmptyDescription);
        }
        if self.location.address.formatted_address.trim().is_empty() {
            return Err(ReportDefect::EmptyAddress);
        }
        if !valid_latitude(self.location.latitude) {
            return Err(ReportDefect::Latitude(self.location.latitude));
        }
        if !valid_longitude(self.location.longitude) {
            return Err(ReportDefect::Longitude(self.location.longitude));
        }
        Ok(())
    }

    /// JSON Schema of the wire record.
    pub fn wire_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(AnomalyReport)).unwrap_or_default()
    }
}

pub fn valid_latitude(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

pub fn valid_longitude(lng: f64) -> bool {
    lng.is_finite() && (-180.0..=180.0).contains(&lng)
}
