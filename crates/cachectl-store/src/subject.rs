//! Domain objects that own a cache.
//!
//! Hosts call `invalidate_cache` from their persistence hooks (created,
//! updated, deleted, restored) so that cached responses derived from the
//! object go stale together with it.

use std::sync::Arc;

use tracing::warn;

use crate::kv::KeyValueStore;
use crate::tagged::TaggedNamespace;

/// An object backed by its own key-value store.
pub trait Cacheable {
    /// The store holding this object's cached data.
    fn cache(&self) -> Arc<dyn KeyValueStore>;

    /// Clear the whole store. Failures are logged.
    fn invalidate_cache(&self) {
        if let Err(e) = self.cache().clear() {
            warn!(error = %e, "Failed to clear cache store");
        }
    }
}

/// An object backed by a tagged namespace.
pub trait CacheControlled {
    /// The namespace holding this object's cached data.
    fn cache(&self) -> TaggedNamespace;

    /// Flush the namespace. Returns how many entries were removed.
    fn invalidate_cache(&self) -> u64 {
        self.cache().invalidate()
    }
}
