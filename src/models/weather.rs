//! Weather snapshot: the provider payload plus best-effort typed views over it

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Coordinate;
use crate::GeoWeatherError;

/// Unit system requested from the weather provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    /// Value sent as the `units` query parameter
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    #[must_use]
    pub fn temperature_label(self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    #[must_use]
    pub fn wind_label(self) -> &'static str {
        match self {
            Self::Metric => "m/s",
            Self::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = GeoWeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            other => Err(GeoWeatherError::validation(format!(
                "unknown unit system '{other}' (expected metric or imperial)"
            ))),
        }
    }
}

// Pointer aliases cover the generic `{current: {...}}` shape and OpenWeatherMap's
// current-weather shape.
const TEMPERATURE: &[&str] = &["/current/temp", "/current/temperature", "/main/temp"];
const FEELS_LIKE: &[&str] = &["/current/feelsLike", "/current/feels_like", "/main/feels_like"];
const HUMIDITY: &[&str] = &["/current/humidity", "/main/humidity"];
const WIND_SPEED: &[&str] = &["/current/windSpeed", "/current/wind_speed", "/wind/speed"];
const DESCRIPTION: &[&str] = &[
    "/current/description",
    "/current/weather/0/description",
    "/weather/0/description",
];
const OBSERVED_AT: &[&str] = &["/current/observedAtEpoch", "/current/dt", "/dt"];
const PLACE: &[&str] = &["/name", "/location/name", "/current/name"];

const POINT_TIME: &[&str] = &["/observedAtEpoch", "/dt", "/time"];
const HOURLY_VALUE: &[&str] = &["/temp", "/temperature", "/main/temp"];
const DAILY_VALUE: &[&str] = &["/temp", "/temp/max", "/temp/day", "/temperature", "/tempMax"];

/// One provider response, keyed by the coordinate that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub coordinate: Coordinate,
    pub units: Units,
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
}

/// Current conditions extracted from a payload; every field is optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentConditions {
    pub place: Option<String>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// A single point of an hourly or daily series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub at: Option<DateTime<Utc>>,
    pub value: f64,
}

impl WeatherSnapshot {
    #[must_use]
    pub fn new(coordinate: Coordinate, units: Units, payload: Value) -> Self {
        Self {
            coordinate,
            units,
            payload,
            fetched_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn current(&self) -> CurrentConditions {
        let payload = &self.payload;
        CurrentConditions {
            place: first_string(payload, PLACE),
            temperature: first_number(payload, TEMPERATURE),
            feels_like: first_number(payload, FEELS_LIKE),
            humidity: first_number(payload, HUMIDITY),
            wind_speed: first_number(payload, WIND_SPEED),
            description: first_string(payload, DESCRIPTION),
            observed_at: first_number(payload, OBSERVED_AT).and_then(epoch_to_utc),
        }
    }

    /// Short-range series from the `hourly` array
    #[must_use]
    pub fn hourly_series(&self) -> Vec<SeriesPoint> {
        series(&self.payload, "/hourly", HOURLY_VALUE)
    }

    /// Multi-day series from the `daily` array
    #[must_use]
    pub fn daily_series(&self) -> Vec<SeriesPoint> {
        series(&self.payload, "/daily", DAILY_VALUE)
    }
}

fn first_number(value: &Value, pointers: &[&str]) -> Option<f64> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .find_map(Value::as_f64)
}

fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_to_utc(epoch: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch as i64, 0)
}

fn series(payload: &Value, pointer: &str, value_pointers: &[&str]) -> Vec<SeriesPoint> {
    payload
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let value = first_number(entry, value_pointers)?;
                    let at = first_number(entry, POINT_TIME).and_then(epoch_to_utc);
                    Some(SeriesPoint { at, value })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationSource;
    use serde_json::json;

    fn snapshot(payload: Value) -> WeatherSnapshot {
        let coordinate = Coordinate::new(52.52, 13.405, LocationSource::Manual).unwrap();
        WeatherSnapshot::new(coordinate, Units::Metric, payload)
    }

    #[test]
    fn test_generic_shape() {
        let snapshot = snapshot(json!({
            "current": {
                "temp": 21.5,
                "feelsLike": 20.9,
                "humidity": 64,
                "windSpeed": 3.2,
                "description": "scattered clouds",
                "observedAtEpoch": 1_705_320_000
            }
        }));
        let current = snapshot.current();
        assert_eq!(current.temperature, Some(21.5));
        assert_eq!(current.feels_like, Some(20.9));
        assert_eq!(current.humidity, Some(64.0));
        assert_eq!(current.wind_speed, Some(3.2));
        assert_eq!(current.description.as_deref(), Some("scattered clouds"));
        assert_eq!(
            current.observed_at.map(|t| t.timestamp()),
            Some(1_705_320_000)
        );
        assert_eq!(current.place, None);
    }

    #[test]
    fn test_openweathermap_shape() {
        let snapshot = snapshot(json!({
            "name": "Polewali",
            "main": {"temp": 27.3, "feels_like": 30.1, "humidity": 80},
            "wind": {"speed": 1.8},
            "weather": [{"description": "light rain"}],
            "dt": 1_705_320_000
        }));
        let current = snapshot.current();
        assert_eq!(current.place.as_deref(), Some("Polewali"));
        assert_eq!(current.temperature, Some(27.3));
        assert_eq!(current.feels_like, Some(30.1));
        assert_eq!(current.wind_speed, Some(1.8));
        assert_eq!(current.description.as_deref(), Some("light rain"));
    }

    #[test]
    fn test_missing_fields_are_none() {
        let snapshot = snapshot(json!({"current": {"temp": 4.0, "feelsLike": null}}));
        let current = snapshot.current();
        assert_eq!(current.temperature, Some(4.0));
        assert_eq!(current.feels_like, None);
        assert_eq!(current.humidity, None);
        assert_eq!(current.description, None);
    }

    #[test]
    fn test_series_extraction() {
        let snapshot = snapshot(json!({
            "hourly": [
                {"dt": 1_705_320_000, "temp": 5.0},
                {"dt": 1_705_323_600, "temp": 6.5},
                {"dt": 1_705_327_200}
            ],
            "daily": [
                {"dt": 1_705_320_000, "temp": {"min": 1.0, "max": 8.0}},
                {"dt": 1_705_406_400, "temp": 9.5}
            ]
        }));
        let hourly = snapshot.hourly_series();
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[1].value, 6.5);
        assert!(hourly[0].at.is_some());

        let daily = snapshot.daily_series();
        assert_eq!(daily.iter().map(|p| p.value).collect::<Vec<_>>(), vec![8.0, 9.5]);
    }

    #[test]
    fn test_units() {
        assert_eq!("Imperial".parse::<Units>().unwrap(), Units::Imperial);
        assert_eq!(Units::Metric.temperature_label(), "°C");
        assert_eq!(Units::Imperial.wind_label(), "mph");
        assert!("kelvin".parse::<Units>().is_err());
    }
}
