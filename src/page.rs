//! One page request end to end: resolve a location, remember it for the session
//! (unless it is the fallback city), fetch the weather and render the result.
//!
//! Every failure ends up in [`RenderedPage::error`] with a rendered message; nothing
//! here returns `Err`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::GeoWeatherError;
use crate::cache::PersistentCache;
use crate::config::{AppConfig, MISSING_API_KEY_MESSAGE};
use crate::location_resolver::{LocationRequest, LocationResolver};
use crate::models::{Coordinate, LocationSource, Units};
use crate::providers::{CommandBridge, HttpGeocoder, HttpIpLocator};
use crate::render::{RenderOptions, Renderer};
use crate::session::{CacheSessionStore, SessionStore};
use crate::weather::{HttpWeatherClient, WeatherClient};

/// Session used when the caller does not name one
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone)]
pub struct PageRequest {
    pub session: String,
    /// Coordinate handed back by a previous round-trip (`--coords`)
    pub query_coordinate: Option<Coordinate>,
    pub city: Option<String>,
    pub manual: Option<(f64, f64)>,
    /// Overrides the configured unit system
    pub units: Option<Units>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            session: DEFAULT_SESSION.to_string(),
            query_coordinate: None,
            city: None,
            manual: None,
            units: None,
        }
    }
}

#[derive(Debug)]
pub struct RenderedPage {
    pub body: String,
    /// The coordinate the page was built for, if one was resolved
    pub coordinate: Option<Coordinate>,
    pub error: Option<GeoWeatherError>,
}

impl RenderedPage {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct WeatherPage {
    resolver: LocationResolver,
    sessions: Arc<dyn SessionStore>,
    weather: Option<Arc<dyn WeatherClient>>,
    renderer: Renderer,
    units: Units,
}

impl std::fmt::Debug for WeatherPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherPage")
            .field("resolver", &self.resolver)
            .field("weather", &self.weather.is_some())
            .field("renderer", &self.renderer)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

impl WeatherPage {
    /// `weather` is `None` when no API key is configured
    #[must_use]
    pub fn new(
        resolver: LocationResolver,
        sessions: Arc<dyn SessionStore>,
        weather: Option<Arc<dyn WeatherClient>>,
        renderer: Renderer,
        units: Units,
    ) -> Self {
        Self {
            resolver,
            sessions,
            weather,
            renderer,
            units,
        }
    }

    /// Wire HTTP providers, the session store and the weather client from configuration
    pub fn from_config(
        config: &AppConfig,
        cache: Arc<PersistentCache>,
        options: RenderOptions,
    ) -> Result<Self, GeoWeatherError> {
        let fallback = Coordinate::new(
            config.defaults.latitude,
            config.defaults.longitude,
            LocationSource::Default,
        )?
        .with_label(config.defaults.city.clone());

        let mut resolver = LocationResolver::new(fallback)
            .with_order(config.resolver.order.clone())
            .with_ip(Arc::new(HttpIpLocator::new(&config.providers)?))
            .with_geocoder(Arc::new(HttpGeocoder::new(&config.providers)?));
        if let Some(bridge) = CommandBridge::from_config(&config.providers) {
            resolver = resolver.with_gps(Arc::new(bridge));
        }

        let session_ttl = Duration::from_secs(u64::from(config.cache.session_ttl_hours) * 3600);
        let sessions = Arc::new(CacheSessionStore::new(cache.clone(), session_ttl));

        let weather: Option<Arc<dyn WeatherClient>> = match config.require_api_key() {
            Ok(key) => {
                let memo_ttl = Duration::from_secs(u64::from(config.cache.weather_ttl_seconds));
                Some(Arc::new(
                    HttpWeatherClient::new(&config.weather, key)?.with_memoization(cache, memo_ttl),
                ))
            }
            Err(_) => {
                warn!("No weather API key configured; weather will not be fetched");
                None
            }
        };

        Ok(Self::new(
            resolver,
            sessions,
            weather,
            Renderer::new(options),
            config.weather.units,
        ))
    }

    /// Build the page for one request
    #[instrument(skip(self, request), fields(session = %request.session))]
    pub async fn render(&self, request: &PageRequest) -> RenderedPage {
        let units = request.units.unwrap_or(self.units);

        let mut location_request = LocationRequest {
            stored: None,
            city: request.city.clone(),
            manual: request.manual,
        };
        location_request.stored = match &request.query_coordinate {
            Some(coordinate) => Some(coordinate.clone()),
            None if location_request.has_explicit_input() => None,
            None => match self.sessions.get(&request.session).await {
                Ok(coordinate) => coordinate,
                Err(e) => {
                    warn!(error = %e, "Session lookup failed, resolving afresh");
                    None
                }
            },
        };

        let resolution = match self.resolver.resolve(&location_request).await {
            Ok(resolution) => resolution,
            Err(e) => return self.failure(Vec::new(), None, e),
        };

        self.remember(&request.session, &resolution.coordinate).await;

        let mut sections = vec![self.renderer.render_location(&resolution)];
        let coordinate = resolution.coordinate;

        let Some(client) = &self.weather else {
            return self.failure(
                sections,
                Some(coordinate),
                GeoWeatherError::configuration(MISSING_API_KEY_MESSAGE),
            );
        };

        match client.fetch(&coordinate, units).await {
            Ok(snapshot) => {
                info!(source = %coordinate.source, "Rendered weather page");
                sections.push(self.renderer.render_snapshot(&snapshot));
                RenderedPage {
                    body: sections.join("\n\n"),
                    coordinate: Some(coordinate),
                    error: None,
                }
            }
            Err(e) => self.failure(sections, Some(coordinate), e),
        }
    }

    /// Forget the session's coordinate
    pub async fn forget(&self, session: &str) -> Result<(), GeoWeatherError> {
        self.sessions.clear(session).await
    }

    /// The fallback city is never remembered, so a later request retries real lookups
    async fn remember(&self, session: &str, coordinate: &Coordinate) {
        if coordinate.source == LocationSource::Default {
            debug!("Not remembering the fallback coordinate");
            return;
        }
        if let Err(e) = self.sessions.set(session, coordinate).await {
            warn!(error = %e, "Could not remember coordinate for session");
        }
    }

    fn failure(
        &self,
        mut sections: Vec<String>,
        coordinate: Option<Coordinate>,
        error: GeoWeatherError,
    ) -> RenderedPage {
        warn!(error = %error, "Page rendered with an error");
        sections.push(self.renderer.render_failure(&error));
        RenderedPage {
            body: sections.join("\n\n"),
            coordinate,
            error: Some(error),
        }
    }
}
