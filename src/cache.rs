//! Persistent TTL store
//!
//! A single fjall keyspace holding postcard-encoded entries stamped with an expiry
//! time. Expired entries read as misses and are dropped on access. Disk access runs
//! on tokio's blocking pool.

use anyhow::{Result, anyhow};
use fjall::Keyspace;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task;
use tracing::{debug, instrument};

const KEYSPACE: &str = "geoweather";

#[derive(Serialize, Deserialize)]
struct Expiring<T> {
    value: T,
    /// Unix seconds
    expires_at: u64,
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// TTL key-value store shared by the session store and weather memoization
pub struct PersistentCache {
    keyspace: Keyspace,
}

impl fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentCache").finish_non_exhaustive()
    }
}

impl PersistentCache {
    /// Opens (or creates) the store under `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(path.as_ref()).open()?;
        let keyspace = db.keyspace(KEYSPACE, fjall::KeyspaceCreateOptions::default)?;
        debug!(path = %path.as_ref().display(), "Opened persistent cache");
        Ok(Self { keyspace })
    }

    /// Store `value` under `key` for `ttl`
    #[instrument(name = "cache_put", level = "debug", skip(self, value))]
    pub async fn put<T: Serialize + Send + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let expires_at = unix_now()?
            .checked_add(ttl.as_secs())
            .ok_or_else(|| anyhow!("TTL overflow for key {key}"))?;
        let bytes = postcard::to_stdvec(&Expiring { value, expires_at })?;

        let keyspace = self.keyspace.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || keyspace.insert(key, bytes)).await??;
        Ok(())
    }

    /// The value under `key`, or `None` when absent or expired
    #[instrument(name = "cache_get", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned + Send + 'static>(&self, key: &str) -> Result<Option<T>> {
        let keyspace = self.keyspace.clone();
        let lookup = key.as_bytes().to_vec();
        let raw = task::spawn_blocking(move || -> Result<Option<Vec<u8>>> {
            Ok(keyspace.get(lookup)?.map(|slice| slice.to_vec()))
        })
        .await??;

        let Some(raw) = raw else {
            debug!("miss");
            return Ok(None);
        };

        let entry: Expiring<T> = postcard::from_bytes(&raw)?;
        if unix_now()? < entry.expires_at {
            debug!("hit");
            Ok(Some(entry.value))
        } else {
            debug!("expired");
            self.remove(key).await?;
            Ok(None)
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let keyspace = self.keyspace.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || keyspace.remove(key)).await??;
        Ok(())
    }
}
