//! Per-endpoint caching policy.

use std::fmt;
use std::sync::Arc;

use cachectl_core::{RequestContext, Response};
use cachectl_store::Ttl;
use chrono::{DateTime, Utc};
use http::HeaderName;

use crate::directives::CacheControlDirectives;
use crate::error::{CacheControlError, CacheControlResult};

/// Computes an ETag from a fresh response.
pub type EtagResolver = Arc<dyn Fn(&Response) -> Option<String> + Send + Sync>;

/// Computes the Last-Modified time for a request.
pub type LastModifiedResolver =
    Arc<dyn Fn(&RequestContext) -> Option<LastModified> + Send + Sync>;

/// Resolves the identity private responses are cached for.
pub type IdentityResolver = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

/// How the ETag validator is obtained.
#[derive(Clone, Default)]
pub enum EtagStrategy {
    /// No ETag.
    #[default]
    Off,
    /// SHA-256 hex digest of the response body.
    Implicit,
    /// Computed by a resolver from the fresh response.
    Explicit(EtagResolver),
}

impl EtagStrategy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, EtagStrategy::Off)
    }
}

impl fmt::Debug for EtagStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::Implicit => f.write_str("Implicit"),
            Self::Explicit(_) => f.write_str("Explicit(..)"),
        }
    }
}

/// How the Last-Modified validator is obtained.
#[derive(Clone, Default)]
pub enum LastModifiedStrategy {
    /// No Last-Modified.
    #[default]
    Off,
    /// Computed by a resolver from the request.
    Explicit(LastModifiedResolver),
}

impl LastModifiedStrategy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, LastModifiedStrategy::Off)
    }
}

impl fmt::Debug for LastModifiedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::Explicit(_) => f.write_str("Explicit(..)"),
        }
    }
}

/// A modification time as yielded by a Last-Modified resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastModified {
    /// Unix timestamp in seconds.
    Timestamp(i64),
    At(DateTime<Utc>),
}

impl LastModified {
    /// The time this value stands for, if it is representable.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            LastModified::Timestamp(secs) => DateTime::from_timestamp(secs, 0),
            LastModified::At(at) => Some(at),
        }
    }
}

impl From<i64> for LastModified {
    fn from(secs: i64) -> Self {
        LastModified::Timestamp(secs)
    }
}

impl From<DateTime<Utc>> for LastModified {
    fn from(at: DateTime<Utc>) -> Self {
        LastModified::At(at)
    }
}

/// Who a response may be cached for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Shared by every client.
    Public,
    /// Bound to one identity; `None` for anonymous requests.
    PrivateTo(Option<String>),
}

impl Scope {
    /// Identity that partitions the cache, if any.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Scope::Public => None,
            Scope::PrivateTo(identity) => identity.as_deref(),
        }
    }
}

/// Caching policy of one logical endpoint.
///
/// Built once and shared; the engine never mutates it while handling
/// requests.
///
/// ```rust
/// use cachectl::{CachingPolicy, LastModified};
///
/// let policy = CachingPolicy::new()
///     .etag()
///     .last_modified(|_req| Some(LastModified::Timestamp(1_700_000_000)))
///     .vary(["Accept-Language"])
///     .ttl(3600)
///     .public();
///
/// assert!(policy.is_public());
/// assert_eq!(policy.vary_headers(), ["Accept-Language"]);
/// ```
#[derive(Clone, Default)]
pub struct CachingPolicy {
    etag: EtagStrategy,
    last_modified: LastModifiedStrategy,
    remember: bool,
    ttl: Option<Ttl>,
    vary: Vec<String>,
    identity: Option<IdentityResolver>,
    directives: CacheControlDirectives,
    expires: Option<DateTime<Utc>>,
}

impl CachingPolicy {
    /// A policy that tracks nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the ETag from the response body.
    #[must_use]
    pub fn etag(mut self) -> Self {
        self.etag = EtagStrategy::Implicit;
        self
    }

    /// Derive the ETag with a resolver.
    #[must_use]
    pub fn etag_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Response) -> Option<String> + Send + Sync + 'static,
    {
        self.etag = EtagStrategy::Explicit(Arc::new(resolver));
        self
    }

    #[must_use]
    pub fn etag_strategy(mut self, strategy: EtagStrategy) -> Self {
        self.etag = strategy;
        self
    }

    /// Derive Last-Modified with a resolver.
    #[must_use]
    pub fn last_modified<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<LastModified> + Send + Sync + 'static,
    {
        self.last_modified = LastModifiedStrategy::Explicit(Arc::new(resolver));
        self
    }

    /// Cache and reuse the response body.
    #[must_use]
    pub fn remember(mut self) -> Self {
        self.remember = true;
        self
    }

    #[must_use]
    pub fn remember_body(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }

    /// Lifetime of stored validators and bodies.
    #[must_use]
    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Request headers that partition the cache. Replaces any earlier list.
    #[must_use]
    pub fn vary<I, T>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.vary = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Share cached entries across identities.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.directives = self.directives.public();
        self
    }

    /// Partition cached entries by identity.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.directives = self.directives.private();
        self
    }

    /// Resolve the identity of private entries with a custom function instead
    /// of `RequestContext::user`.
    #[must_use]
    pub fn identify_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.identity = Some(Arc::new(resolver));
        self
    }

    /// Replace the `Cache-Control` directives.
    #[must_use]
    pub fn cache_control(mut self, directives: CacheControlDirectives) -> Self {
        self.directives = directives;
        self
    }

    /// Attach an `Expires` header to fresh responses.
    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    // === Accessors ===

    pub fn etag_tracking(&self) -> &EtagStrategy {
        &self.etag
    }

    pub fn last_modified_tracking(&self) -> &LastModifiedStrategy {
        &self.last_modified
    }

    pub fn remembers_body(&self) -> bool {
        self.remember
    }

    pub fn ttl_value(&self) -> Option<Ttl> {
        self.ttl
    }

    pub fn vary_headers(&self) -> &[String] {
        &self.vary
    }

    pub fn directives(&self) -> &CacheControlDirectives {
        &self.directives
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    /// Whether entries are shared across identities: `public` is set and
    /// `private` is not.
    pub fn is_public(&self) -> bool {
        self.directives.public == Some(true) && self.directives.private != Some(true)
    }

    /// Scope of the entry for `request`.
    pub fn scope(&self, request: &RequestContext) -> Scope {
        if self.is_public() {
            return Scope::Public;
        }

        let identity = match &self.identity {
            Some(resolve) => resolve(request),
            None => request.user.clone(),
        };
        Scope::PrivateTo(identity)
    }

    /// Check that the policy can be used by the engine.
    pub fn validate(&self) -> CacheControlResult<()> {
        for name in &self.vary {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                CacheControlError::Configuration(format!("invalid Vary header name: {name:?}"))
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for CachingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingPolicy")
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .field("remember", &self.remember)
            .field("ttl", &self.ttl)
            .field("vary", &self.vary)
            .field("identity", &self.identity.as_ref().map(|_| ".."))
            .field("directives", &self.directives)
            .field("expires", &self.expires)
            .finish()
    }
}
