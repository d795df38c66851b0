//! Coordinate model: a validated latitude/longitude pair and where it came from

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GeoWeatherError;

/// Provenance of a resolved coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    BrowserGps,
    Ip,
    CitySearch,
    QueryParam,
    Manual,
    Default,
}

impl LocationSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrowserGps => "browser_gps",
            Self::Ip => "ip",
            Self::CitySearch => "city_search",
            Self::QueryParam => "query_param",
            Self::Manual => "manual",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved location
///
/// Deserialization goes through the same range check as [`Coordinate::new`], so a
/// corrupted session entry or a hand-edited payload cannot smuggle in bad values.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Which strategy produced this coordinate
    pub source: LocationSource,
    /// Place name reported by the provider, if any
    pub label: Option<String>,
    /// Accuracy radius reported by host geolocation
    pub accuracy_meters: Option<f64>,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
    source: LocationSource,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    accuracy_meters: Option<f64>,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoWeatherError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        validate_pair(raw.latitude, raw.longitude)?;
        Ok(Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            source: raw.source,
            label: raw.label,
            accuracy_meters: raw.accuracy_meters,
        })
    }
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values
    pub fn new(latitude: f64, longitude: f64, source: LocationSource) -> Result<Self, GeoWeatherError> {
        validate_pair(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
            source,
            label: None,
            accuracy_meters: None,
        })
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.trim().is_empty()).then_some(label);
        self
    }

    #[must_use]
    pub fn with_accuracy(mut self, accuracy_meters: Option<f64>) -> Self {
        self.accuracy_meters = accuracy_meters.filter(|m| m.is_finite() && *m >= 0.0);
        self
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Cache key for a weather request at this coordinate
    #[must_use]
    pub fn cache_key(&self, units: &str) -> String {
        let (lat, lon) = self.rounded_coordinates(4);
        format!("weather:{units}:{lat:.4}:{lon:.4}")
    }
}

/// Check a latitude/longitude pair against the WGS84 ranges
pub fn validate_pair(latitude: f64, longitude: f64) -> Result<(), GeoWeatherError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(GeoWeatherError::validation(format!(
            "latitude {latitude} is outside [-90, 90]"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(GeoWeatherError::validation(format!(
            "longitude {longitude} is outside [-180, 180]"
        )));
    }
    Ok(())
}

/// Parse a `"lat,lon"` pair, as used by ipinfo's `loc` field and the `--coords` flag
pub fn parse_pair(raw: &str) -> Result<(f64, f64), GeoWeatherError> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| GeoWeatherError::validation(format!("expected 'lat,lon', got '{raw}'")))?;
    let lat = f64::from_str(lat.trim())
        .map_err(|_| GeoWeatherError::validation(format!("latitude '{}' is not a number", lat.trim())))?;
    let lon = f64::from_str(lon.trim())
        .map_err(|_| GeoWeatherError::validation(format!("longitude '{}' is not a number", lon.trim())))?;
    validate_pair(lat, lon)?;
    Ok((lat, lon))
}
