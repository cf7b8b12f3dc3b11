//! # cachectl-store
//!
//! Storage layer for cachectl: a synchronous key-value abstraction with
//! per-entry TTL, an in-memory reference backend, and tagged namespaces that
//! compose keys and invalidate as a group.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cachectl_store::{InMemoryStore, KeyValueStore, TaggedNamespace};
//!
//! let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
//! let posts = TaggedNamespace::for_subject(store, "posts").with_prefix(["feed"]);
//!
//! posts.put("page-1", &vec![1, 2, 3]).unwrap();
//! assert_eq!(posts.caching_key("page-1"), "posts/feed/page-1");
//!
//! posts.invalidate();
//! assert_eq!(posts.get::<Vec<u32>>("page-1").unwrap(), None);
//! ```

pub mod clock;
pub mod error;
pub mod kv;
pub mod memory;
pub mod subject;
pub mod tagged;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use kv::{JsonStoreExt, KeyValueStore, TagIndex};
pub use memory::InMemoryStore;
pub use subject::{CacheControlled, Cacheable};
pub use tagged::{PrefixToken, Taggable, TaggedNamespace, DEFAULT_TTL};
pub use ttl::Ttl;
