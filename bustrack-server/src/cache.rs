//! Caching layer for the stop inventory.
//!
//! Every proximity query scans all stops. The inventory changes rarely, so
//! it is read from the store at most once per TTL and shared between
//! requests. Concurrent misses are coalesced into a single load.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::Stop;
use crate::store::{Store, StoreError};

/// Cached stop inventory.
type StopsEntry = Arc<Vec<Stop>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for the cached inventory.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

/// Store reader that caches the full list of stops.
pub struct StopCache {
    store: Arc<dyn Store>,
    stops: MokaCache<(), StopsEntry>,
}

impl StopCache {
    /// Create a new cache with the given configuration.
    pub fn new(store: Arc<dyn Store>, config: &CacheConfig) -> Self {
        let stops = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(1)
            .build();

        Self { store, stops }
    }

    /// All stops, loading them from the store on a miss.
    pub async fn stops(&self) -> Result<StopsEntry, Arc<StoreError>> {
        self.stops
            .try_get_with((), async {
                let stops = self.store.all_stops().await?;
                debug!(count = stops.len(), "loaded stop inventory");
                Ok::<_, StoreError>(Arc::new(stops))
            })
            .await
    }
}
