//! The conditional cache engine.
//!
//! For every request the engine reads the stored validators, answers with
//! `304 Not Modified` when the client's copy is still fresh, and otherwise
//! runs the content producer, recomputes validators from the fresh response,
//! checks the request again, and stores what it learned.

use std::fmt;
use std::sync::Arc;

use cachectl_core::{Reply, RequestContext, Response, StatusCode, MAX_RESOLVE_DEPTH};
use cachectl_store::{
    CacheControlled, Cacheable, KeyValueStore, StoreResult, TaggedNamespace, Ttl,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, debug_span, warn};

use crate::conditional;
use crate::error::{CacheControlError, CacheControlResult};
use crate::fingerprint::CacheFingerprint;
use crate::policy::{CachingPolicy, EtagStrategy, LastModifiedStrategy};

/// Tag prepended to namespaces holding per-request validators.
pub const REQUEST_TAG: &str = "request";

/// Produces fresh content for a request.
///
/// `cached` carries the previously stored body when the policy remembers
/// bodies and one was found; the producer may answer with it directly.
pub trait ContentProducer: Send + Sync {
    fn produce(&self, request: &RequestContext, cached: Option<Vec<u8>>) -> anyhow::Result<Reply>;
}

impl<F> ContentProducer for F
where
    F: Fn(&RequestContext, Option<Vec<u8>>) -> anyhow::Result<Reply> + Send + Sync,
{
    fn produce(&self, request: &RequestContext, cached: Option<Vec<u8>>) -> anyhow::Result<Reply> {
        self(request, cached)
    }
}

/// Producer that answers with the cached body when there is one.
pub struct ReuseCached<F>(F);

/// Wrap a request-only producer so that a remembered body is served without
/// calling it.
pub fn reuse_cached<F>(producer: F) -> ReuseCached<F>
where
    F: Fn(&RequestContext) -> anyhow::Result<Reply> + Send + Sync,
{
    ReuseCached(producer)
}

impl<F> ContentProducer for ReuseCached<F>
where
    F: Fn(&RequestContext) -> anyhow::Result<Reply> + Send + Sync,
{
    fn produce(&self, request: &RequestContext, cached: Option<Vec<u8>>) -> anyhow::Result<Reply> {
        match cached {
            Some(body) => Ok(Reply::content(body)),
            None => (self.0)(request),
        }
    }
}

/// Where validators and bodies are kept.
#[derive(Clone)]
pub enum CacheSource {
    /// Plain store; keys are `<fingerprint>/<part>`.
    Store(Arc<dyn KeyValueStore>),
    /// Tagged namespace; keys are `request/<fingerprint>/<part>` and go away
    /// when the namespace is invalidated.
    Tagged(TaggedNamespace),
}

impl CacheSource {
    /// Use the store owned by a domain object.
    pub fn from_cacheable(subject: &impl Cacheable) -> Self {
        Self::Store(subject.cache())
    }

    /// Use the namespace owned by a domain object.
    pub fn from_cache_controlled(subject: &impl CacheControlled) -> Self {
        Self::Tagged(subject.cache())
    }
}

impl From<Arc<dyn KeyValueStore>> for CacheSource {
    fn from(store: Arc<dyn KeyValueStore>) -> Self {
        Self::Store(store)
    }
}

impl From<TaggedNamespace> for CacheSource {
    fn from(namespace: TaggedNamespace) -> Self {
        Self::Tagged(namespace)
    }
}

impl fmt::Debug for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(_) => f.write_str("Store(..)"),
            Self::Tagged(ns) => f.debug_tuple("Tagged").field(ns).finish(),
        }
    }
}

/// Validators and body stored for one fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorRecord {
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy)]
enum Part {
    Etag,
    LastModified,
    Content,
}

impl Part {
    fn name(self) -> &'static str {
        match self {
            Part::Etag => "etag",
            Part::LastModified => "last_modified",
            Part::Content => "content",
        }
    }
}

/// Storage of one fingerprint's record.
enum RecordSlot<'a> {
    Raw {
        store: &'a dyn KeyValueStore,
        fingerprint: &'a CacheFingerprint,
        ttl: Option<Ttl>,
    },
    Tagged(TaggedNamespace),
}

impl RecordSlot<'_> {
    fn key(&self, part: Part) -> String {
        match self {
            RecordSlot::Raw { fingerprint, .. } => match part {
                Part::Etag => fingerprint.etag_key(),
                Part::LastModified => fingerprint.last_modified_key(),
                Part::Content => fingerprint.content_key(),
            },
            RecordSlot::Tagged(ns) => ns.caching_key(part.name()),
        }
    }

    fn read(&self, part: Part) -> StoreResult<Option<Vec<u8>>> {
        match self {
            RecordSlot::Raw { store, .. } => store.get(&self.key(part)),
            RecordSlot::Tagged(ns) => ns.get_raw(part.name()),
        }
    }

    fn write(&self, part: Part, value: Vec<u8>) -> StoreResult<()> {
        match self {
            RecordSlot::Raw { store, ttl, .. } => store.set(&self.key(part), value, *ttl),
            RecordSlot::Tagged(ns) => ns.put_raw(part.name(), value),
        }
    }

    fn remove(&self, part: Part) -> StoreResult<bool> {
        match self {
            RecordSlot::Raw { store, .. } => store.delete(&self.key(part)),
            RecordSlot::Tagged(ns) => ns.forget(part.name()),
        }
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, part: Part) -> StoreResult<Option<T>> {
        match self.read(part)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Answers requests from stored validators, producing content only when the
/// client's copy is stale.
///
/// ```rust
/// use std::sync::Arc;
/// use cachectl::{reuse_cached, CachingPolicy, ConditionalCache};
/// use cachectl_core::{Reply, RequestContext, StatusCode};
/// use cachectl_store::{InMemoryStore, KeyValueStore};
///
/// let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
/// let cache = ConditionalCache::new(
///     store,
///     CachingPolicy::new().etag(),
///     reuse_cached(|_req| Ok(Reply::content("hello"))),
/// )
/// .unwrap();
///
/// let first = cache.handle(&RequestContext::get("/greeting")).unwrap();
/// let etag = first.etag().unwrap().to_string();
///
/// let replay = RequestContext::get("/greeting").with_header("If-None-Match", etag);
/// assert_eq!(cache.handle(&replay).unwrap().status(), StatusCode::NOT_MODIFIED);
/// ```
pub struct ConditionalCache {
    source: CacheSource,
    policy: CachingPolicy,
    producer: Box<dyn ContentProducer>,
}

impl ConditionalCache {
    /// Create an engine.
    ///
    /// Fails when the policy is invalid or a tagged source has no tags.
    pub fn new<S, P>(source: S, policy: CachingPolicy, producer: P) -> CacheControlResult<Self>
    where
        S: Into<CacheSource>,
        P: ContentProducer + 'static,
    {
        let source = source.into();
        policy.validate()?;

        if let CacheSource::Tagged(ns) = &source {
            if ns.tags().is_empty() {
                return Err(CacheControlError::Configuration(
                    "tagged cache source needs at least one tag".to_string(),
                ));
            }
        }

        Ok(Self {
            source,
            policy,
            producer: Box::new(producer),
        })
    }

    pub fn policy(&self) -> &CachingPolicy {
        &self.policy
    }

    pub fn source(&self) -> &CacheSource {
        &self.source
    }

    /// Fingerprint `request` would be stored under.
    pub fn fingerprint(&self, request: &RequestContext) -> CacheFingerprint {
        let scope = self.policy.scope(request);
        CacheFingerprint::compute(request, self.policy.vary_headers(), scope.identity())
    }

    /// Answer one request.
    pub fn handle(&self, request: &RequestContext) -> CacheControlResult<Response> {
        let fingerprint = self.fingerprint(request);
        let span = debug_span!(
            "conditional_cache",
            fingerprint = %fingerprint,
            method = %request.method,
            path = %request.path,
        );
        let _enter = span.enter();

        let slot = self.slot(&fingerprint);
        let cached = self.read_record(&slot);

        let mut response = Response::new(StatusCode::OK);
        self.attach_validators(&mut response, &cached);

        if conditional::apply(request, &mut response) {
            debug!("Client copy is fresh; answering without producing");
            self.touch(&slot, &cached);
            return Ok(response);
        }

        let offered = if self.policy.remembers_body() {
            cached.body.clone()
        } else {
            None
        };
        let reply = self
            .producer
            .produce(request, offered)
            .map_err(CacheControlError::Producer)?;
        let mut response = reply.into_response(request, MAX_RESOLVE_DEPTH)?;

        let fresh = self.fresh_record(request, &response)?;
        self.attach_validators(&mut response, &fresh);
        self.attach_freshness(&mut response);

        if conditional::apply(request, &mut response) {
            debug!("Fresh validators match; answering 304");
        } else {
            debug!(status = %response.status(), "Produced fresh response");
        }

        self.persist(&slot, &fresh);
        Ok(response)
    }

    /// What is currently stored for `request`, read the way `handle` reads it.
    pub fn stored(&self, request: &RequestContext) -> ValidatorRecord {
        let fingerprint = self.fingerprint(request);
        self.read_record(&self.slot(&fingerprint))
    }

    /// Delete everything stored for `request`.
    pub fn forget(&self, request: &RequestContext) -> CacheControlResult<()> {
        let fingerprint = self.fingerprint(request);
        let slot = self.slot(&fingerprint);
        for part in [Part::Etag, Part::LastModified, Part::Content] {
            slot.remove(part)?;
        }
        Ok(())
    }

    fn slot<'a>(&'a self, fingerprint: &'a CacheFingerprint) -> RecordSlot<'a> {
        match &self.source {
            CacheSource::Store(store) => RecordSlot::Raw {
                store: store.as_ref(),
                fingerprint,
                ttl: self.policy.ttl_value(),
            },
            CacheSource::Tagged(ns) => {
                let mut ns = ns
                    .clone()
                    .prepend_tag(REQUEST_TAG)
                    .with_prefix([fingerprint.as_str()]);
                if let Some(ttl) = self.policy.ttl_value() {
                    ns = ns.with_ttl(ttl);
                }
                RecordSlot::Tagged(ns)
            }
        }
    }

    fn read_record(&self, slot: &RecordSlot<'_>) -> ValidatorRecord {
        let mut record = ValidatorRecord::default();

        if self.policy.etag_tracking().is_enabled() {
            record.etag = read_or_miss(slot.read_json(Part::Etag), Part::Etag);
        }
        if self.policy.last_modified_tracking().is_enabled() {
            record.last_modified =
                read_or_miss(slot.read_json(Part::LastModified), Part::LastModified);
        }
        if self.policy.remembers_body() {
            record.body = read_or_miss(slot.read(Part::Content), Part::Content);
        }
        record
    }

    fn fresh_record(
        &self,
        request: &RequestContext,
        response: &Response,
    ) -> CacheControlResult<ValidatorRecord> {
        let etag = match self.policy.etag_tracking() {
            EtagStrategy::Off => None,
            EtagStrategy::Implicit => Some(hex::encode(Sha256::digest(response.body()))),
            EtagStrategy::Explicit(resolve) => resolve(response),
        };

        let last_modified = match self.policy.last_modified_tracking() {
            LastModifiedStrategy::Off => None,
            LastModifiedStrategy::Explicit(resolve) => {
                let value = resolve(request).ok_or_else(|| {
                    CacheControlError::ValidatorResolution(
                        "resolver returned no timestamp or date".to_string(),
                    )
                })?;
                let at = value.to_datetime().ok_or_else(|| {
                    CacheControlError::ValidatorResolution(format!(
                        "{value:?} is outside the representable range"
                    ))
                })?;
                Some(at)
            }
        };

        let body = self
            .policy
            .remembers_body()
            .then(|| response.body().to_vec());

        Ok(ValidatorRecord {
            etag,
            last_modified,
            body,
        })
    }

    fn attach_validators(&self, response: &mut Response, record: &ValidatorRecord) {
        if let Some(etag) = &record.etag {
            response.set_etag(etag);
        }
        if let Some(at) = record.last_modified {
            response.set_last_modified(at);
        }

        let directives = self.policy.directives().header_value();
        if !directives.is_empty() {
            response.set_cache_control(&directives);
        }
    }

    fn attach_freshness(&self, response: &mut Response) {
        if !self.policy.vary_headers().is_empty() {
            response.set_vary(self.policy.vary_headers());
        }
        if let Some(at) = self.policy.expires_at() {
            response.set_expires(at);
        }
    }

    /// Rewrite what was read so it lives for another TTL.
    fn touch(&self, slot: &RecordSlot<'_>, record: &ValidatorRecord) {
        if let Some(etag) = &record.etag {
            write_json(slot, Part::Etag, etag);
        }
        if let Some(at) = &record.last_modified {
            write_json(slot, Part::LastModified, at);
        }
        if let Some(body) = &record.body {
            write_or_warn(slot, Part::Content, body.clone());
        }
    }

    /// Store the fresh record; parts the policy tracks but that are now
    /// absent are deleted.
    fn persist(&self, slot: &RecordSlot<'_>, record: &ValidatorRecord) {
        if self.policy.etag_tracking().is_enabled() {
            match &record.etag {
                Some(etag) => write_json(slot, Part::Etag, etag),
                None => remove_or_warn(slot, Part::Etag),
            }
        }
        if self.policy.last_modified_tracking().is_enabled() {
            match &record.last_modified {
                Some(at) => write_json(slot, Part::LastModified, at),
                None => remove_or_warn(slot, Part::LastModified),
            }
        }
        if self.policy.remembers_body() {
            match &record.body {
                Some(body) => write_or_warn(slot, Part::Content, body.clone()),
                None => remove_or_warn(slot, Part::Content),
            }
        }
    }
}

impl fmt::Debug for ConditionalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalCache")
            .field("source", &self.source)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn read_or_miss<T>(result: StoreResult<Option<T>>, part: Part) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!(part = part.name(), error = %e, "Cache read failed; treating as miss");
        None
    })
}

fn write_json<T: serde::Serialize>(slot: &RecordSlot<'_>, part: Part, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => write_or_warn(slot, part, bytes),
        Err(e) => warn!(part = part.name(), error = %e, "Failed to encode cache value"),
    }
}

fn write_or_warn(slot: &RecordSlot<'_>, part: Part, value: Vec<u8>) {
    if let Err(e) = slot.write(part, value) {
        warn!(part = part.name(), error = %e, "Cache write failed");
    }
}

fn remove_or_warn(slot: &RecordSlot<'_>, part: Part) {
    if let Err(e) = slot.remove(part) {
        warn!(part = part.name(), error = %e, "Cache delete failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachectl_store::InMemoryStore;

    fn engine(source: CacheSource, policy: CachingPolicy) -> ConditionalCache {
        ConditionalCache::new(source, policy, reuse_cached(|_| Ok(Reply::content("body")))).unwrap()
    }

    // === Slot Keys ===

    #[test]
    fn test_raw_slot_keys() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let cache = engine(CacheSource::Store(store), CachingPolicy::new());
        let fp = cache.fingerprint(&RequestContext::get("/"));
        let slot = cache.slot(&fp);

        assert_eq!(slot.key(Part::Etag), format!("{fp}/etag"));
        assert_eq!(slot.key(Part::LastModified), format!("{fp}/last_modified"));
        assert_eq!(slot.key(Part::Content), format!("{fp}/content"));
    }

    #[test]
    fn test_tagged_slot_keys() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let ns = TaggedNamespace::for_subject(store, "posts");
        let cache = engine(CacheSource::Tagged(ns), CachingPolicy::new());
        let fp = cache.fingerprint(&RequestContext::get("/"));

        match cache.slot(&fp) {
            RecordSlot::Tagged(ns) => {
                assert_eq!(ns.tags(), [REQUEST_TAG, "posts"]);
                assert_eq!(ns.caching_key("etag"), format!("request/{fp}/etag"));
                assert_eq!(ns.ttl(), Some(cachectl_store::DEFAULT_TTL));
            }
            RecordSlot::Raw { .. } => panic!("expected a tagged slot"),
        }
    }

    // === Record Round Trip ===

    #[test]
    fn test_touch_writes_only_present_parts() {
        let store = Arc::new(InMemoryStore::new());
        let cache = engine(
            CacheSource::Store(store.clone()),
            CachingPolicy::new().etag().remember(),
        );
        let fp = cache.fingerprint(&RequestContext::get("/"));
        let slot = cache.slot(&fp);

        let record = ValidatorRecord {
            etag: Some("abc".to_string()),
            ..Default::default()
        };
        cache.touch(&slot, &record);

        assert_eq!(store.keys().unwrap(), vec![fp.etag_key()]);
        assert_eq!(cache.read_record(&slot), record);
    }

    #[test]
    fn test_corrupt_entry_reads_as_miss() {
        let store = Arc::new(InMemoryStore::new());
        let cache = engine(CacheSource::Store(store.clone()), CachingPolicy::new().etag());
        let fp = cache.fingerprint(&RequestContext::get("/"));
        store.set(&fp.etag_key(), b"{not json".to_vec(), None).unwrap();

        assert_eq!(cache.stored(&RequestContext::get("/")).etag, None);
    }
}
