//! Location Resolution Module
//!
//! Resolves the user's position by trying strategies in a fixed order and
//! stopping at the first one that yields a coordinate. Every strategy is
//! best-effort: its failure is recorded and the next one is tried.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::GeoWeatherError;
use crate::models::{Coordinate, LocationSource};
use crate::providers::{GeolocationBridge, Geocoder, IpLocator};

/// One way of obtaining a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Reuse a coordinate from a prior round-trip (query parameter or session)
    Stored,
    BrowserGps,
    Ip,
    CitySearch,
    Manual,
    Default,
}

impl Strategy {
    pub const DEFAULT_ORDER: [Strategy; 6] = [
        Strategy::Stored,
        Strategy::BrowserGps,
        Strategy::Ip,
        Strategy::CitySearch,
        Strategy::Manual,
        Strategy::Default,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::BrowserGps => "browser_gps",
            Self::Ip => "ip",
            Self::CitySearch => "city_search",
            Self::Manual => "manual",
            Self::Default => "default",
        }
    }

    /// Strategies that locate the user without anything typed in
    #[must_use]
    pub fn is_automatic(self) -> bool {
        matches!(self, Self::BrowserGps | Self::Ip)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = GeoWeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::DEFAULT_ORDER
            .into_iter()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| {
                GeoWeatherError::validation(format!(
                    "unknown strategy '{s}' (expected one of stored, browser_gps, ip, city_search, manual, default)"
                ))
            })
    }
}

/// Inputs the user (or a prior round-trip) supplied for this resolution
#[derive(Debug, Clone, Default)]
pub struct LocationRequest {
    pub stored: Option<Coordinate>,
    pub city: Option<String>,
    pub manual: Option<(f64, f64)>,
}

impl LocationRequest {
    /// A city or coordinate pair was typed in
    #[must_use]
    pub fn has_explicit_input(&self) -> bool {
        self.manual.is_some() || self.city.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Why a strategy did not produce a coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: Strategy,
    pub reason: String,
}

/// A resolved coordinate plus the strategies that failed before it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub coordinate: Coordinate,
    pub failures: Vec<StrategyFailure>,
}

/// Service for resolving the user's location
pub struct LocationResolver {
    order: Vec<Strategy>,
    gps: Option<Arc<dyn GeolocationBridge>>,
    ip: Option<Arc<dyn IpLocator>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    fallback: Coordinate,
}

impl fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationResolver")
            .field("order", &self.order)
            .field("gps", &self.gps.is_some())
            .field("ip", &self.ip.is_some())
            .field("geocoder", &self.geocoder.is_some())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl LocationResolver {
    /// Resolver with the default order and no providers attached
    #[must_use]
    pub fn new(fallback: Coordinate) -> Self {
        Self {
            order: Strategy::DEFAULT_ORDER.to_vec(),
            gps: None,
            ip: None,
            geocoder: None,
            fallback,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: Vec<Strategy>) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_gps(mut self, gps: Arc<dyn GeolocationBridge>) -> Self {
        self.gps = Some(gps);
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: Arc<dyn IpLocator>) -> Self {
        self.ip = Some(ip);
        self
    }

    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    #[must_use]
    pub fn order(&self) -> &[Strategy] {
        &self.order
    }

    /// Try each strategy in order; the first coordinate wins.
    ///
    /// Typed input outranks automatic lookups, so GPS and IP are passed over
    /// (without recording a failure) when the request carries a city or coordinates.
    #[instrument(skip(self, request))]
    pub async fn resolve(&self, request: &LocationRequest) -> Result<Resolution, GeoWeatherError> {
        let mut failures = Vec::new();
        let explicit = request.has_explicit_input();

        for &strategy in &self.order {
            if explicit && strategy.is_automatic() {
                debug!(%strategy, "Location entered, skipping automatic lookup");
                continue;
            }
            match self.attempt(strategy, request).await {
                Ok(coordinate) => {
                    info!(
                        %strategy,
                        lat = coordinate.latitude,
                        lon = coordinate.longitude,
                        "Resolved location"
                    );
                    return Ok(Resolution {
                        coordinate,
                        failures,
                    });
                }
                Err(e) => {
                    debug!(%strategy, error = %e, "Strategy failed, trying next");
                    failures.push(StrategyFailure {
                        strategy,
                        reason: e.to_string(),
                    });
                }
            }
        }

        warn!("All location strategies failed");
        let summary = failures
            .iter()
            .map(|f| format!("{}: {}", f.strategy, f.reason))
            .collect::<Vec<_>>()
            .join("; ");
        Err(GeoWeatherError::location_unavailable(summary))
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        request: &LocationRequest,
    ) -> Result<Coordinate, GeoWeatherError> {
        match strategy {
            Strategy::Stored => request
                .stored
                .clone()
                .ok_or_else(|| GeoWeatherError::location_unavailable("no stored coordinate")),
            Strategy::BrowserGps => self.resolve_gps().await,
            Strategy::Ip => self.resolve_ip().await,
            Strategy::CitySearch => self.resolve_city(request.city.as_deref()).await,
            Strategy::Manual => {
                let (lat, lon) = request.manual.ok_or_else(|| {
                    GeoWeatherError::location_unavailable("no coordinates entered")
                })?;
                Coordinate::new(lat, lon, LocationSource::Manual)
            }
            Strategy::Default => Ok(self.fallback.clone()),
        }
    }

    async fn resolve_gps(&self) -> Result<Coordinate, GeoWeatherError> {
        let bridge = self.gps.as_ref().ok_or_else(|| {
            GeoWeatherError::location_unavailable("geolocation bridge not available")
        })?;

        let reply = bridge.request_position().await?;
        if !reply.ok {
            return Err(GeoWeatherError::location_unavailable(
                reply
                    .error_message
                    .unwrap_or_else(|| "geolocation denied".to_string()),
            ));
        }

        match (reply.latitude, reply.longitude) {
            (Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon, LocationSource::BrowserGps)?
                .with_accuracy(reply.accuracy_meters)),
            _ => Err(GeoWeatherError::location_unavailable(
                "geolocation reply has no coordinates",
            )),
        }
    }

    async fn resolve_ip(&self) -> Result<Coordinate, GeoWeatherError> {
        let locator = self.ip.as_ref().ok_or_else(|| {
            GeoWeatherError::location_unavailable("IP lookup not configured")
        })?;

        let location = locator.locate().await?;
        let coordinate = Coordinate::new(location.latitude, location.longitude, LocationSource::Ip)?;
        Ok(match location.label() {
            Some(label) => coordinate.with_label(label),
            None => coordinate,
        })
    }

    async fn resolve_city(&self, city: Option<&str>) -> Result<Coordinate, GeoWeatherError> {
        let city = city
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GeoWeatherError::location_unavailable("no city entered"))?;
        let geocoder = self.geocoder.as_ref().ok_or_else(|| {
            GeoWeatherError::location_unavailable("geocoding not configured")
        })?;

        debug!("Geocoding location name: {}", city);
        let first = geocoder
            .search(city)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GeoWeatherError::location_unavailable(format!("no matches for '{city}'"))
            })?;

        debug!(
            "Found location: {} ({:.4}, {:.4})",
            first.display_name, first.latitude, first.longitude
        );
        Ok(Coordinate::new(first.latitude, first.longitude, LocationSource::CitySearch)?
            .with_label(first.display_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{GeocodeMatch, GeolocationReply, IpLocation};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedBridge(GeolocationReply);

    #[async_trait]
    impl GeolocationBridge for FixedBridge {
        async fn request_position(&self) -> Result<GeolocationReply, GeoWeatherError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingIp {
        result: Option<IpLocation>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IpLocator for CountingIp {
        async fn locate(&self) -> Result<IpLocation, GeoWeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .ok_or_else(|| GeoWeatherError::provider_status(503, String::new(), "down"))
        }
    }

    struct FixedGeocoder(Vec<GeocodeMatch>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn search(&self, _query: &str) -> Result<Vec<GeocodeMatch>, GeoWeatherError> {
            Ok(self.0.clone())
        }
    }

    fn polewali() -> Coordinate {
        Coordinate::new(-3.4324, 119.3435, LocationSource::Default)
            .unwrap()
            .with_label("Polewali,ID")
    }

    fn mountain_view() -> IpLocation {
        IpLocation {
            latitude: 37.386,
            longitude: -122.0838,
            city: Some("Mountain View".into()),
            region: None,
            country: Some("US".into()),
        }
    }

    #[tokio::test]
    async fn test_manual_entry_is_echoed_exactly() {
        let resolver =
            LocationResolver::new(polewali()).with_order(vec![Strategy::Manual, Strategy::Default]);
        let request = LocationRequest {
            manual: Some((12.345_678, -98.765_432)),
            ..LocationRequest::default()
        };
        let resolution = resolver.resolve(&request).await.unwrap();
        assert_eq!(resolution.coordinate.latitude, 12.345_678);
        assert_eq!(resolution.coordinate.longitude, -98.765_432);
        assert_eq!(resolution.coordinate.source, LocationSource::Manual);
        assert!(resolution.failures.is_empty());
    }

    #[tokio::test]
    async fn test_zero_geocoding_matches_continues_to_next_strategy() {
        let resolver = LocationResolver::new(polewali())
            .with_order(vec![Strategy::CitySearch, Strategy::Manual, Strategy::Default])
            .with_geocoder(Arc::new(FixedGeocoder(vec![])));
        let request = LocationRequest {
            city: Some("Atlantis".into()),
            manual: Some((1.0, 2.0)),
            ..LocationRequest::default()
        };
        let resolution = resolver.resolve(&request).await.unwrap();
        assert_eq!(resolution.coordinate.source, LocationSource::Manual);
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].strategy, Strategy::CitySearch);
        assert!(resolution.failures[0].reason.contains("Location unavailable"));
        assert!(resolution.failures[0].reason.contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_first_geocoding_match_wins() {
        let resolver = LocationResolver::new(polewali())
            .with_order(vec![Strategy::CitySearch])
            .with_geocoder(Arc::new(FixedGeocoder(vec![
                GeocodeMatch {
                    latitude: 48.8566,
                    longitude: 2.3522,
                    display_name: "Paris, France".into(),
                },
                GeocodeMatch {
                    latitude: 33.6609,
                    longitude: -95.5555,
                    display_name: "Paris, Texas".into(),
                },
            ])));
        let request = LocationRequest {
            city: Some("Paris".into()),
            ..LocationRequest::default()
        };
        let coordinate = resolver.resolve(&request).await.unwrap().coordinate;
        assert_eq!(coordinate.source, LocationSource::CitySearch);
        assert_eq!(coordinate.label.as_deref(), Some("Paris, France"));
    }

    #[tokio::test]
    async fn test_denied_gps_falls_through_ip_to_default_city() {
        let ip = Arc::new(CountingIp::default());
        let resolver = LocationResolver::new(polewali())
            .with_gps(Arc::new(FixedBridge(GeolocationReply::denied(
                "User denied Geolocation",
            ))))
            .with_ip(ip.clone());

        let resolution = resolver.resolve(&LocationRequest::default()).await.unwrap();

        assert_eq!(ip.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolution.coordinate, polewali());
        assert_eq!(resolution.coordinate.label.as_deref(), Some("Polewali,ID"));
        let failed: Vec<Strategy> = resolution.failures.iter().map(|f| f.strategy).collect();
        assert_eq!(
            failed,
            vec![
                Strategy::Stored,
                Strategy::BrowserGps,
                Strategy::Ip,
                Strategy::CitySearch,
                Strategy::Manual
            ]
        );
        assert!(resolution.failures[1].reason.contains("User denied Geolocation"));
    }

    #[tokio::test]
    async fn test_denied_gps_uses_ip_when_available() {
        let ip = Arc::new(CountingIp {
            result: Some(mountain_view()),
            ..CountingIp::default()
        });
        let resolver = LocationResolver::new(polewali())
            .with_gps(Arc::new(FixedBridge(GeolocationReply::denied(
                "User denied Geolocation",
            ))))
            .with_ip(ip);

        let coordinate = resolver
            .resolve(&LocationRequest::default())
            .await
            .unwrap()
            .coordinate;
        assert_eq!(coordinate.source, LocationSource::Ip);
        assert_eq!(coordinate.label.as_deref(), Some("Mountain View, US"));
    }

    #[tokio::test]
    async fn test_gps_position_carries_accuracy() {
        let resolver = LocationResolver::new(polewali()).with_gps(Arc::new(FixedBridge(
            GeolocationReply::position(51.5, -0.12, Some(12.0)),
        )));
        let coordinate = resolver
            .resolve(&LocationRequest::default())
            .await
            .unwrap()
            .coordinate;
        assert_eq!(coordinate.source, LocationSource::BrowserGps);
        assert_eq!(coordinate.accuracy_meters, Some(12.0));
    }

    #[tokio::test]
    async fn test_stored_coordinate_is_idempotent_and_skips_providers() {
        let ip = Arc::new(CountingIp {
            result: Some(mountain_view()),
            ..CountingIp::default()
        });
        let resolver = LocationResolver::new(polewali()).with_ip(ip.clone());
        let stored = Coordinate::new(40.7128, -74.006, LocationSource::BrowserGps)
            .unwrap()
            .with_accuracy(Some(30.0));
        let request = LocationRequest {
            stored: Some(stored.clone()),
            ..LocationRequest::default()
        };

        let first = resolver.resolve(&request).await.unwrap();
        let second = resolver.resolve(&request).await.unwrap();

        assert_eq!(first.coordinate, stored);
        assert_eq!(first, second);
        assert_eq!(ip.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_location_unavailable() {
        let resolver = LocationResolver::new(polewali())
            .with_order(vec![Strategy::BrowserGps, Strategy::Ip, Strategy::Manual]);
        let err = resolver
            .resolve(&LocationRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeoWeatherError::LocationUnavailable { .. }));
        let message = err.to_string();
        assert!(message.contains("browser_gps: "));
        assert!(message.contains("ip: "));
        assert!(message.contains("manual: "));
    }

    #[tokio::test]
    async fn test_out_of_range_manual_entry_is_a_strategy_failure() {
        let resolver =
            LocationResolver::new(polewali()).with_order(vec![Strategy::Manual, Strategy::Default]);
        let request = LocationRequest {
            manual: Some((95.0, 10.0)),
            ..LocationRequest::default()
        };
        let resolution = resolver.resolve(&request).await.unwrap();
        assert_eq!(resolution.coordinate.source, LocationSource::Default);
        assert!(resolution.failures[0].reason.contains("latitude"));
    }

    #[tokio::test]
    async fn test_typed_city_outranks_ip_lookup() {
        let ip = Arc::new(CountingIp {
            result: Some(mountain_view()),
            ..CountingIp::default()
        });
        let resolver = LocationResolver::new(polewali())
            .with_gps(Arc::new(FixedBridge(GeolocationReply::position(
                51.5, -0.12, None,
            ))))
            .with_ip(ip.clone())
            .with_geocoder(Arc::new(FixedGeocoder(vec![GeocodeMatch {
                latitude: -5.1477,
                longitude: 119.4327,
                display_name: "Makassar".into(),
            }])));
        let request = LocationRequest {
            city: Some("Makassar".into()),
            ..LocationRequest::default()
        };

        let resolution = resolver.resolve(&request).await.unwrap();

        assert_eq!(resolution.coordinate.source, LocationSource::CitySearch);
        assert_eq!(ip.calls.load(Ordering::SeqCst), 0);
        let failed: Vec<Strategy> = resolution.failures.iter().map(|f| f.strategy).collect();
        assert_eq!(failed, vec![Strategy::Stored]);
    }

    #[tokio::test]
    async fn test_typed_coordinates_outrank_ip_lookup() {
        let ip = Arc::new(CountingIp {
            result: Some(mountain_view()),
            ..CountingIp::default()
        });
        let resolver = LocationResolver::new(polewali()).with_ip(ip.clone());
        let request = LocationRequest {
            manual: Some((-5.0, 120.0)),
            ..LocationRequest::default()
        };

        let coordinate = resolver.resolve(&request).await.unwrap().coordinate;

        assert_eq!(coordinate.source, LocationSource::Manual);
        assert_eq!((coordinate.latitude, coordinate.longitude), (-5.0, 120.0));
        assert_eq!(ip.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blank_city_is_not_explicit_input() {
        let request = LocationRequest {
            city: Some("   ".into()),
            ..LocationRequest::default()
        };
        assert!(!request.has_explicit_input());
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("city-search".parse::<Strategy>().unwrap(), Strategy::CitySearch);
        assert_eq!("IP".parse::<Strategy>().unwrap(), Strategy::Ip);
        assert!("carrier-pigeon".parse::<Strategy>().is_err());
    }
}
