//! Application state for the web layer.

use std::sync::Arc;

use mockable::Clock;

use crate::auth::{PasswordHasher, TokenService};
use crate::cache::{CacheConfig, StopCache};
use crate::store::Store;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Persistence
    pub store: Arc<dyn Store>,

    /// Cached stop inventory for proximity queries
    pub stops: Arc<StopCache>,

    /// Token issuing and verification
    pub tokens: Arc<TokenService>,

    /// Bounded password hashing pool
    pub passwords: PasswordHasher,

    /// Source of "now" for reminder scheduling
    pub clock: Arc<dyn Clock + Send + Sync>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenService,
        passwords: PasswordHasher,
        cache_config: &CacheConfig,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            stops: Arc::new(StopCache::new(store.clone(), cache_config)),
            store,
            tokens: Arc::new(tokens),
            passwords,
            clock,
        }
    }
}
