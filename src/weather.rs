//! Weather API client
//!
//! One bounded-timeout GET per request, no retries. Every failure (transport,
//! non-2xx, malformed body) comes back as a `Provider` error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::GeoWeatherError;
use crate::cache::PersistentCache;
use crate::config::WeatherConfig;
use crate::models::{Coordinate, Units, WeatherSnapshot};
use crate::providers::{USER_AGENT, read_body};

#[async_trait]
pub trait WeatherClient: Send + Sync {
    /// Current (and, when the provider includes them, hourly/daily) weather at `coordinate`
    async fn fetch(
        &self,
        coordinate: &Coordinate,
        units: Units,
    ) -> Result<WeatherSnapshot, GeoWeatherError>;
}

/// What the memoization cache keeps per request
#[derive(Serialize, Deserialize)]
struct MemoEntry {
    fetched_at: DateTime<Utc>,
    payload: Value,
}

/// Client for `GET <base_url>/weather?lat=&lon=&units=&<key_param>=`
pub struct HttpWeatherClient {
    client: Client,
    base_url: String,
    key_param: String,
    api_key: String,
    memo: Option<(Arc<PersistentCache>, Duration)>,
}

impl std::fmt::Debug for HttpWeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWeatherClient")
            .field("base_url", &self.base_url)
            .field("key_param", &self.key_param)
            .field("memo", &self.memo.as_ref().map(|(_, ttl)| ttl))
            .finish_non_exhaustive()
    }
}

impl HttpWeatherClient {
    /// Create a new weather API client
    pub fn new(config: &WeatherConfig, api_key: impl Into<String>) -> Result<Self, GeoWeatherError> {
        let timeout = Duration::from_secs(u64::from(config.timeout_seconds));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GeoWeatherError::provider(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_param: config.key_param.clone(),
            api_key: api_key.into(),
            memo: None,
        })
    }

    /// Memoize identical requests for `ttl`; a zero TTL leaves memoization off
    #[must_use]
    pub fn with_memoization(mut self, cache: Arc<PersistentCache>, ttl: Duration) -> Self {
        self.memo = (!ttl.is_zero()).then_some((cache, ttl));
        self
    }

    fn build_url(&self, coordinate: &Coordinate, units: Units) -> String {
        format!(
            "{}/weather?lat={}&lon={}&units={}&{}={}",
            self.base_url,
            coordinate.latitude,
            coordinate.longitude,
            units,
            self.key_param,
            urlencoding::encode(&self.api_key)
        )
    }

    async fn memoized(&self, key: &str) -> Option<MemoEntry> {
        let (cache, _) = self.memo.as_ref()?;
        match cache.get::<String>(key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .map_err(|e| warn!("Discarding unreadable memoized weather: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("Weather memoization lookup failed: {}", e);
                None
            }
        }
    }

    async fn memoize(&self, key: &str, entry: &MemoEntry) {
        let Some((cache, ttl)) = self.memo.as_ref() else {
            return;
        };
        let raw = match serde_json::to_string(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize weather for memoization: {}", e);
                return;
            }
        };
        if let Err(e) = cache.put(key, raw, *ttl).await {
            warn!("Weather memoization store failed: {}", e);
        }
    }

    async fn request(&self, coordinate: &Coordinate, units: Units) -> Result<Value, GeoWeatherError> {
        let url = self.build_url(coordinate, units);
        debug!(
            "Weather API request URL: {}",
            url.replace(&urlencoding::encode(&self.api_key).into_owned(), "<redacted>")
        );

        let start_time = Instant::now();
        let response = self.client.get(&url).send().await?;
        let body = read_body(response, "Weather API").await?;

        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            GeoWeatherError::Provider {
                status: Some(200),
                body: Some(body.clone()),
                message: format!("malformed weather response: {e}"),
            }
        })?;
        if !payload.is_object() {
            return Err(GeoWeatherError::Provider {
                status: Some(200),
                body: Some(body),
                message: "weather response is not a JSON object".to_string(),
            });
        }

        let total_duration = start_time.elapsed();
        info!(
            "Retrieved weather in {:.3}s",
            total_duration.as_secs_f64()
        );
        if total_duration.as_secs() > 5 {
            warn!(
                "Slow API response detected: {:.3}s",
                total_duration.as_secs_f64()
            );
        }

        Ok(payload)
    }
}

#[async_trait]
impl WeatherClient for HttpWeatherClient {
    #[instrument(skip(self, coordinate), fields(lat = coordinate.latitude, lon = coordinate.longitude))]
    async fn fetch(
        &self,
        coordinate: &Coordinate,
        units: Units,
    ) -> Result<WeatherSnapshot, GeoWeatherError> {
        let key = coordinate.cache_key(units.as_str());

        if let Some(entry) = self.memoized(&key).await {
            debug!("Serving memoized weather for {}", key);
            return Ok(WeatherSnapshot {
                coordinate: coordinate.clone(),
                units,
                payload: entry.payload,
                fetched_at: entry.fetched_at,
            });
        }

        let payload = self.request(coordinate, units).await?;
        let snapshot = WeatherSnapshot::new(coordinate.clone(), units, payload);

        self.memoize(
            &key,
            &MemoEntry {
                fetched_at: snapshot.fetched_at,
                payload: snapshot.payload.clone(),
            },
        )
        .await;

        Ok(snapshot)
    }
}
