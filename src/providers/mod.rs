//! Location providers
//!
//! Each provider backs one resolution strategy:
//! - gps: host geolocation bridge (an external command standing in for the browser API)
//! - ip: approximate location from the caller's public IP
//! - geocoding: free-text city search

pub mod geocoding;
pub mod gps;
pub mod ip;

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::GeoWeatherError;

pub use geocoding::{GeocodeMatch, Geocoder, HttpGeocoder};
pub use gps::{CommandBridge, GeolocationBridge, GeolocationReply};
pub use ip::{HttpIpLocator, IpLocation, IpLocator};

pub(crate) const USER_AGENT: &str = concat!("GeoWeather/", env!("CARGO_PKG_VERSION"));

/// HTTP client with the bounded timeout every provider call uses
pub(crate) fn http_client(timeout_seconds: u32) -> Result<Client, GeoWeatherError> {
    Client::builder()
        .timeout(Duration::from_secs(u64::from(timeout_seconds)))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| GeoWeatherError::provider(format!("failed to create HTTP client: {e}")))
}

/// Read a response body, turning non-2xx statuses into provider errors
pub(crate) async fn read_body(
    response: reqwest::Response,
    service: &str,
) -> Result<String, GeoWeatherError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(GeoWeatherError::provider_status(
            status.as_u16(),
            body,
            format!("{service} returned HTTP {status}"),
        ));
    }
    Ok(body)
}

/// Providers disagree on whether coordinates are JSON numbers or strings
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NumberOrString> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "lenient_f64")]
        value: Option<f64>,
    }

    #[test]
    fn test_lenient_f64() {
        let sample: Sample = serde_json::from_str(r#"{"value": 1.5}"#).unwrap();
        assert_eq!(sample.value, Some(1.5));
        let sample: Sample = serde_json::from_str(r#"{"value": " -3.25 "}"#).unwrap();
        assert_eq!(sample.value, Some(-3.25));
        let sample: Sample = serde_json::from_str(r#"{"value": "n/a"}"#).unwrap();
        assert_eq!(sample.value, None);
        let sample: Sample = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(sample.value, None);
        let sample: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(sample.value, None);
    }
}
