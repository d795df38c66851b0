//! Approximate location from the caller's public IP address.
//!
//! Works against ipinfo.io, ipapi.co and ip-api.com style responses: coordinates
//! may come as `latitude`/`longitude`, `lat`/`lon`, or an ipinfo `loc` string.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{http_client, lenient_f64, read_body};
use crate::GeoWeatherError;
use crate::config::ProvidersConfig;
use crate::models::{parse_pair, validate_pair};

/// Location reported by an IP geolocation service
#[derive(Debug, Clone, PartialEq)]
pub struct IpLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl IpLocation {
    /// "City, Region, Country" from whichever parts are known
    #[must_use]
    pub fn label(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.region, &self.country]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.trim().is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

#[async_trait]
pub trait IpLocator: Send + Sync {
    async fn locate(&self) -> Result<IpLocation, GeoWeatherError>;
}

/// Services name the same value differently and some send several spellings at
/// once, so each spelling gets its own field.
#[derive(Debug, Deserialize)]
struct IpResponse {
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lng: Option<f64>,
    /// ipinfo: "37.3860,-122.0838"
    loc: Option<String>,
    city: Option<String>,
    region: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    country: Option<String>,
    country_name: Option<String>,
}

impl IpResponse {
    fn into_location(self) -> Result<IpLocation, GeoWeatherError> {
        let latitude = self.latitude.or(self.lat);
        let longitude = self.longitude.or(self.lon).or(self.lng);
        let (latitude, longitude) = match (latitude, longitude, self.loc.as_deref()) {
            (Some(lat), Some(lon), _) => {
                validate_pair(lat, lon)?;
                (lat, lon)
            }
            (_, _, Some(loc)) => parse_pair(loc)?,
            _ => {
                return Err(GeoWeatherError::provider(
                    "IP lookup response has no coordinates",
                ));
            }
        };

        Ok(IpLocation {
            latitude,
            longitude,
            city: self.city,
            region: self.region_name.or(self.region),
            country: self.country_name.or(self.country),
        })
    }
}

/// Parse an IP lookup body
pub fn parse_ip_response(body: &str) -> Result<IpLocation, GeoWeatherError> {
    let response: IpResponse = serde_json::from_str(body)
        .map_err(|e| GeoWeatherError::provider(format!("malformed IP lookup response: {e}")))?;
    response.into_location()
}

/// IP locator calling `GET <base_url>/json`
#[derive(Debug)]
pub struct HttpIpLocator {
    client: Client,
    base_url: String,
}

impl HttpIpLocator {
    pub fn new(config: &ProvidersConfig) -> Result<Self, GeoWeatherError> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            base_url: config.ip_lookup_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IpLocator for HttpIpLocator {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn locate(&self) -> Result<IpLocation, GeoWeatherError> {
        let url = format!("{}/json", self.base_url);
        debug!(url = %url, "Looking up location by IP");

        let response = self.client.get(&url).send().await?;
        let body = read_body(response, "IP lookup").await?;
        let location = parse_ip_response(&body)?;

        debug!(
            lat = location.latitude,
            lon = location.longitude,
            city = ?location.city,
            "IP lookup resolved"
        );
        Ok(location)
    }
}
