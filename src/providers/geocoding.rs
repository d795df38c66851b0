//! Forward geocoding: city name to coordinates.
//!
//! The first match in provider order wins; there is no ranking or disambiguation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{http_client, lenient_f64, read_body};
use crate::GeoWeatherError;
use crate::config::ProvidersConfig;

/// One geocoding candidate
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Matches for `query` in provider order; empty when nothing matched
    async fn search(&self, query: &str) -> Result<Vec<GeocodeMatch>, GeoWeatherError>;
}

#[derive(Debug, Deserialize)]
struct RawMatch {
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
    #[serde(rename = "displayName")]
    display_name_camel: Option<String>,
    display_name: Option<String>,
    name: Option<String>,
}

/// Nominatim answers with a bare array, Open-Meteo with `{"results": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    List(Vec<RawMatch>),
    Wrapped {
        #[serde(default)]
        results: Option<Vec<RawMatch>>,
    },
}

/// Parse a geocoding body, skipping candidates without usable coordinates
pub fn parse_search_response(body: &str, query: &str) -> Result<Vec<GeocodeMatch>, GeoWeatherError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| GeoWeatherError::provider(format!("malformed geocoding response: {e}")))?;

    let raw = match response {
        SearchResponse::List(matches) => matches,
        SearchResponse::Wrapped { results } => results.unwrap_or_default(),
    };

    Ok(raw
        .into_iter()
        .filter_map(|m| {
            let latitude = m.latitude.or(m.lat)?;
            let longitude = m.longitude.or(m.lon).or(m.lng)?;
            crate::models::validate_pair(latitude, longitude).ok()?;
            Some(GeocodeMatch {
                latitude,
                longitude,
                display_name: m
                    .display_name_camel
                    .or(m.display_name)
                    .or(m.name)
                    .unwrap_or_else(|| query.to_string()),
            })
        })
        .collect())
}

/// Geocoder calling `GET <base_url>/search?<query_param>=<city>`
#[derive(Debug)]
pub struct HttpGeocoder {
    client: Client,
    base_url: String,
    query_param: String,
}

impl HttpGeocoder {
    pub fn new(config: &ProvidersConfig) -> Result<Self, GeoWeatherError> {
        Ok(Self {
            client: http_client(config.timeout_seconds)?,
            base_url: config.geocoding_url.trim_end_matches('/').to_string(),
            query_param: config.geocoding_query_param.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<GeocodeMatch>, GeoWeatherError> {
        let url = format!(
            "{}/search?{}={}&format=json&limit=5",
            self.base_url,
            self.query_param,
            urlencoding::encode(query)
        );
        debug!(url = %url, "Geocoding location name");

        let response = self.client.get(&url).send().await?;
        let body = read_body(response, "Geocoding").await?;
        let matches = parse_search_response(&body, query)?;

        debug!("Geocoding returned {} matches", matches.len());
        Ok(matches)
    }
}
