//! Public SDK for cachectl.
//!
//! This crate re-exports the request model, the storage layer and the engine:
//!
//! ```rust
//! use std::sync::Arc;
//! use cachectl_sdk::prelude::*;
//!
//! let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
//! let posts = TaggedNamespace::for_subject(store, "posts");
//!
//! let cache = ConditionalCache::new(
//!     posts.clone(),
//!     CachingPolicy::new().etag().remember().public(),
//!     reuse_cached(|req| Ok(Reply::content(format!("post {}", req.path)))),
//! )
//! .unwrap();
//!
//! let response = cache.handle(&RequestContext::get("/posts/1")).unwrap();
//! assert_eq!(response.status(), StatusCode::OK);
//!
//! // a post was saved: drop every response cached for posts
//! posts.invalidate();
//! ```

pub use cachectl;
pub use cachectl_core;
pub use cachectl_store;

/// Prelude for convenient imports.
pub mod prelude {
    pub use cachectl::{
        reuse_cached, CacheControlDirectives, CacheControlError, CacheControlResult,
        CacheFingerprint, CacheSource, CachingPolicy, ConditionalCache, ContentProducer,
        DirectiveAge, EtagStrategy, LastModified, LastModifiedStrategy, PolicyConfig, Scope,
    };
    pub use cachectl_core::{
        Headers, Method, Reply, RequestContext, Resolvable, Response, StatusCode,
    };
    pub use cachectl_store::{
        CacheControlled, Cacheable, Clock, InMemoryStore, JsonStoreExt, KeyValueStore,
        ManualClock, PrefixToken, StoreError, SystemClock, Taggable, TaggedNamespace, Ttl,
    };
}
