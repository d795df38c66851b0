//! Last resolved coordinate per session, so later invocations do not ask the
//! host for permission again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::GeoWeatherError;
use crate::cache::PersistentCache;
use crate::models::Coordinate;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session: &str) -> Result<Option<Coordinate>, GeoWeatherError>;
    async fn set(&self, session: &str, coordinate: &Coordinate) -> Result<(), GeoWeatherError>;
    async fn clear(&self, session: &str) -> Result<(), GeoWeatherError>;
}

/// Session store backed by the persistent cache
#[derive(Debug, Clone)]
pub struct CacheSessionStore {
    cache: Arc<PersistentCache>,
    ttl: Duration,
}

impl CacheSessionStore {
    #[must_use]
    pub fn new(cache: Arc<PersistentCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    fn key(session: &str) -> String {
        format!("session:{session}:coordinate")
    }
}

#[async_trait]
impl SessionStore for CacheSessionStore {
    async fn get(&self, session: &str) -> Result<Option<Coordinate>, GeoWeatherError> {
        let coordinate = self
            .cache
            .get::<Coordinate>(&Self::key(session))
            .await
            .map_err(|e| GeoWeatherError::cache(e.to_string()))?;
        debug!(session, found = coordinate.is_some(), "Loaded session coordinate");
        Ok(coordinate)
    }

    async fn set(&self, session: &str, coordinate: &Coordinate) -> Result<(), GeoWeatherError> {
        self.cache
            .put(&Self::key(session), coordinate.clone(), self.ttl)
            .await
            .map_err(|e| GeoWeatherError::cache(e.to_string()))
    }

    async fn clear(&self, session: &str) -> Result<(), GeoWeatherError> {
        self.cache
            .remove(&Self::key(session))
            .await
            .map_err(|e| GeoWeatherError::cache(e.to_string()))
    }
}
