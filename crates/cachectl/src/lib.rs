//! # cachectl
//!
//! HTTP conditional caching for request handlers.
//!
//! [`ConditionalCache`] answers requests from stored ETag and Last-Modified
//! validators, returning `304 Not Modified` when the client's copy is still
//! fresh and running the content producer otherwise. Validators and bodies
//! live in a [`KeyValueStore`](cachectl_store::KeyValueStore) or in a
//! [`TaggedNamespace`](cachectl_store::TaggedNamespace), so that invalidating
//! a domain object drops every response cached for it.
//!
//! ## Modules
//!
//! - [`policy`] - What to track, for how long, and for whom
//! - [`directives`] - `Cache-Control` directive set
//! - [`fingerprint`] - Request identity and storage keys
//! - [`conditional`] - `If-None-Match` / `If-Modified-Since` evaluation
//! - [`engine`] - The request flow
//! - [`config`] - Policies from TOML or JSON files

pub mod conditional;
pub mod config;
pub mod directives;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod policy;

pub use config::{DirectivesConfig, EtagMode, PolicyConfig, ScopeMode};
pub use directives::{CacheControlDirectives, DirectiveAge};
pub use engine::{
    reuse_cached, CacheSource, ConditionalCache, ContentProducer, ReuseCached, ValidatorRecord,
    REQUEST_TAG,
};
pub use error::{CacheControlError, CacheControlResult};
pub use fingerprint::CacheFingerprint;
pub use policy::{
    CachingPolicy, EtagResolver, EtagStrategy, IdentityResolver, LastModified,
    LastModifiedResolver, LastModifiedStrategy, Scope,
};
