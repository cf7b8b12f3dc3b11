//! Tag-scoped namespaces over a [`KeyValueStore`].
//!
//! A namespace composes storage keys as `tags[0]/prefix/local` and invalidates
//! as a group. Backends with a [`TagIndex`](crate::TagIndex) flush every key
//! registered under any of the namespace's tags; backends that can only list
//! keys lose everything under the primary tag; anything else makes
//! invalidation a logged no-op.

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::kv::{JsonStoreExt, KeyValueStore};
use crate::ttl::Ttl;

/// Lifetime given to namespaces built with [`TaggedNamespace::for_subject`].
pub const DEFAULT_TTL: Ttl = Ttl::Seconds(7 * 24 * 60 * 60);

/// A domain object that can appear in a namespace prefix as `tag#id`.
pub trait Taggable {
    /// Tag naming the object's kind, e.g. `post`.
    fn cache_tag(&self) -> String;

    /// Identifier of this instance.
    fn cache_id(&self) -> String;

    /// Prefix token referring to this instance.
    fn prefix_token(&self) -> PrefixToken {
        PrefixToken::Identity {
            tag: self.cache_tag(),
            id: self.cache_id(),
        }
    }
}

/// One segment of a namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixToken {
    /// Plain value, written as is.
    Scalar(String),
    /// Reference to a domain object, written as `tag#id`.
    Identity { tag: String, id: String },
}

impl PrefixToken {
    fn render(&self) -> String {
        match self {
            PrefixToken::Scalar(s) => s.clone(),
            PrefixToken::Identity { tag, id } => format!("{tag}#{id}"),
        }
    }
}

impl From<&str> for PrefixToken {
    fn from(s: &str) -> Self {
        PrefixToken::Scalar(s.to_string())
    }
}

impl From<String> for PrefixToken {
    fn from(s: String) -> Self {
        PrefixToken::Scalar(s)
    }
}

impl From<u64> for PrefixToken {
    fn from(n: u64) -> Self {
        PrefixToken::Scalar(n.to_string())
    }
}

impl From<i64> for PrefixToken {
    fn from(n: i64) -> Self {
        PrefixToken::Scalar(n.to_string())
    }
}

/// A group of cache entries sharing tags and a key prefix.
#[derive(Clone)]
pub struct TaggedNamespace {
    store: Arc<dyn KeyValueStore>,
    tags: Vec<String>,
    prefix: String,
    ttl: Option<Ttl>,
}

impl TaggedNamespace {
    /// Create an untagged namespace whose entries never expire.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            tags: Vec::new(),
            prefix: String::new(),
            ttl: None,
        }
    }

    /// Create a namespace tagged with `subject`, expiring entries after a week.
    pub fn for_subject(store: Arc<dyn KeyValueStore>, subject: impl Into<String>) -> Self {
        Self::new(store).depends_on([subject]).with_ttl(DEFAULT_TTL)
    }

    /// Set the lifetime of entries written from now on.
    #[must_use]
    pub fn with_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Keep entries until they are invalidated.
    #[must_use]
    pub fn without_expiry(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Replace the key prefix. Empty tokens are skipped.
    #[must_use]
    pub fn with_prefix<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<PrefixToken>,
    {
        self.prefix = tokens
            .into_iter()
            .map(|t| t.into().render())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        self
    }

    /// Add tags, keeping the first occurrence of each.
    #[must_use]
    pub fn depends_on<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }

    /// Make `tag` the primary tag.
    #[must_use]
    pub fn prepend_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tags.retain(|t| *t != tag);
        self.tags.insert(0, tag);
        self
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn ttl(&self) -> Option<Ttl> {
        self.ttl
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Storage key for `key` inside this namespace.
    pub fn caching_key(&self, key: &str) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(tag) = self.primary_tag() {
            parts.push(tag);
        }
        if !self.prefix.is_empty() {
            parts.push(self.prefix.as_str());
        }
        parts.push(key);
        parts.join("/")
    }

    // === Storage ===

    /// Read a JSON value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        self.store.get_json(&self.caching_key(key))
    }

    /// Write a JSON value.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_raw(key, bytes)
    }

    /// Read raw bytes.
    pub fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.store.get(&self.caching_key(key))
    }

    /// Register the key under every tag, then write raw bytes.
    ///
    /// The key is tagged before the write so an invalidation that lands in
    /// between still removes the new entry.
    pub fn put_raw(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let full_key = self.caching_key(key);
        if let Some(index) = self.store.tag_index() {
            index.tag_key(&self.tags, &full_key)?;
        }
        self.store.set(&full_key, value, self.ttl)
    }

    /// Delete one entry.
    pub fn forget(&self, key: &str) -> StoreResult<bool> {
        self.store.delete(&self.caching_key(key))
    }

    /// Return the cached value, or compute, store and return it.
    ///
    /// Concurrent callers may each run `compute`; the last write wins.
    pub fn remember<T, E, F>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
        F: FnOnce(&str) -> Result<T, E>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }

        let value = compute(key)?;
        self.put(key, &value)?;
        Ok(value)
    }

    /// Drop every entry of this namespace. Returns how many were removed.
    ///
    /// Never fails: backend errors and missing capabilities are logged.
    pub fn invalidate(&self) -> u64 {
        let Some(primary) = self.primary_tag() else {
            warn!("Cannot invalidate a namespace without tags");
            return 0;
        };

        if let Some(index) = self.store.tag_index() {
            return match index.flush_tags(&self.tags) {
                Ok(removed) => {
                    debug!(tags = ?self.tags, removed, "Flushed tagged namespace");
                    removed
                }
                Err(e) => {
                    warn!(tags = ?self.tags, error = %e, "Tag flush failed");
                    0
                }
            };
        }

        let scope = format!("{primary}/");
        let result = self.store.keys().and_then(|keys| {
            let doomed: Vec<&str> = keys
                .iter()
                .map(String::as_str)
                .filter(|k| k.starts_with(&scope))
                .collect();
            self.store.delete_many(&doomed)
        });

        match result {
            Ok(removed) => {
                debug!(prefix = %scope, removed, "Flushed namespace by prefix");
                removed
            }
            Err(StoreError::Unsupported(capability)) => {
                warn!(
                    tag = primary,
                    capability, "Store cannot invalidate namespaces; skipping"
                );
                0
            }
            Err(e) => {
                warn!(tag = primary, error = %e, "Prefix flush failed");
                0
            }
        }
    }
}

impl fmt::Debug for TaggedNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedNamespace")
            .field("tags", &self.tags)
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::TagIndex;
    use crate::memory::InMemoryStore;

    struct Post {
        id: u64,
    }

    impl Taggable for Post {
        fn cache_tag(&self) -> String {
            "post".to_string()
        }

        fn cache_id(&self) -> String {
            self.id.to_string()
        }
    }

    /// Lists keys but keeps no tag index.
    struct ListingStore(InMemoryStore);

    impl KeyValueStore for ListingStore {
        fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> StoreResult<()> {
            self.0.set(key, value, ttl)
        }
        fn delete(&self, key: &str) -> StoreResult<bool> {
            self.0.delete(key)
        }
        fn clear(&self) -> StoreResult<()> {
            self.0.clear()
        }
        fn keys(&self) -> StoreResult<Vec<String>> {
            self.0.keys()
        }
    }

    /// Neither lists keys nor keeps a tag index.
    struct OpaqueStore(InMemoryStore);

    impl KeyValueStore for OpaqueStore {
        fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> StoreResult<()> {
            self.0.set(key, value, ttl)
        }
        fn delete(&self, key: &str) -> StoreResult<bool> {
            self.0.delete(key)
        }
        fn clear(&self) -> StoreResult<()> {
            self.0.clear()
        }
    }

    /// Flushes the `posts` tag right after every write, as a concurrent
    /// invalidation would.
    struct InvalidatedOnWrite(InMemoryStore);

    impl KeyValueStore for InvalidatedOnWrite {
        fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> StoreResult<()> {
            self.0.set(key, value, ttl)?;
            self.0.flush_tags(&["posts".to_string()])?;
            Ok(())
        }
        fn delete(&self, key: &str) -> StoreResult<bool> {
            self.0.delete(key)
        }
        fn clear(&self) -> StoreResult<()> {
            self.0.clear()
        }
        fn keys(&self) -> StoreResult<Vec<String>> {
            self.0.keys()
        }
        fn tag_index(&self) -> Option<&dyn TagIndex> {
            self.0.tag_index()
        }
    }

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(InMemoryStore::new())
    }

    // === Key Composition ===

    #[test]
    fn test_caching_key_without_prefix() {
        let ns = TaggedNamespace::for_subject(memory(), "posts");
        assert_eq!(ns.caching_key("index"), "posts/index");
    }

    #[test]
    fn test_caching_key_with_prefix() {
        let ns = TaggedNamespace::for_subject(memory(), "posts")
            .with_prefix([PrefixToken::from("feed"), Post { id: 7 }.prefix_token()]);
        assert_eq!(ns.caching_key("index"), "posts/feed/post#7/index");
    }

    #[test]
    fn test_with_prefix_replaces_and_skips_empty() {
        let ns = TaggedNamespace::for_subject(memory(), "posts")
            .with_prefix(["a", "b"])
            .with_prefix(["", "c", ""]);
        assert_eq!(ns.prefix(), "c");
        assert_eq!(ns.caching_key("k"), "posts/c/k");
    }

    #[test]
    fn test_depends_on_dedupes_and_keeps_order() {
        let ns = TaggedNamespace::for_subject(memory(), "posts")
            .depends_on(["users", "posts", "tags"]);
        assert_eq!(ns.tags(), ["posts", "users", "tags"]);
    }

    #[test]
    fn test_prepend_tag_becomes_primary() {
        let ns = TaggedNamespace::for_subject(memory(), "posts")
            .depends_on(["request"])
            .prepend_tag("request");
        assert_eq!(ns.tags(), ["request", "posts"]);
        assert_eq!(ns.caching_key("k"), "request/k");
    }

    #[test]
    fn test_default_ttl_is_one_week() {
        let ns = TaggedNamespace::for_subject(memory(), "posts");
        assert_eq!(ns.ttl(), Some(Ttl::Seconds(604_800)));
        assert_eq!(ns.without_expiry().ttl(), None);
    }

    // === Storage ===

    #[test]
    fn test_put_get_forget() {
        let ns = TaggedNamespace::for_subject(memory(), "posts");
        ns.put("count", &3u32).unwrap();
        assert_eq!(ns.get::<u32>("count").unwrap(), Some(3));

        assert!(ns.forget("count").unwrap());
        assert_eq!(ns.get::<u32>("count").unwrap(), None);
    }

    #[test]
    fn test_raw_values() {
        let store = memory();
        let ns = TaggedNamespace::for_subject(store.clone(), "posts");
        ns.put_raw("body", b"<p>hi</p>".to_vec()).unwrap();
        assert_eq!(store.get("posts/body").unwrap(), Some(b"<p>hi</p>".to_vec()));
        assert_eq!(ns.get_raw("body").unwrap(), Some(b"<p>hi</p>".to_vec()));
    }

    #[test]
    fn test_remember_computes_once() {
        let ns = TaggedNamespace::for_subject(memory(), "posts");
        let mut calls = 0;

        let first: Result<String, StoreError> = ns.remember("title", |key| {
            calls += 1;
            Ok(format!("computed {key}"))
        });
        assert_eq!(first.unwrap(), "computed title");

        let second: Result<String, StoreError> = ns.remember("title", |_| {
            calls += 1;
            Ok("again".to_string())
        });
        assert_eq!(second.unwrap(), "computed title");
        assert_eq!(calls, 1);
    }

    // === Invalidation ===

    #[test]
    fn test_invalidate_with_tag_index() {
        let store = memory();
        let posts = TaggedNamespace::for_subject(store.clone(), "posts");
        let per_request = posts.clone().prepend_tag("request").with_prefix(["abc"]);
        let users = TaggedNamespace::for_subject(store.clone(), "users");

        posts.put("a", &1).unwrap();
        per_request.put("etag", &"x").unwrap();
        users.put("a", &1).unwrap();

        assert_eq!(posts.invalidate(), 2);
        assert_eq!(posts.get::<i32>("a").unwrap(), None);
        assert_eq!(per_request.get::<String>("etag").unwrap(), None);
        assert_eq!(users.get::<i32>("a").unwrap(), Some(1));
    }

    #[test]
    fn test_invalidation_during_write_removes_entry() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InvalidatedOnWrite(InMemoryStore::new()));
        let posts = TaggedNamespace::for_subject(store.clone(), "posts");

        posts.put("a", &1).unwrap();
        assert_eq!(posts.get::<i32>("a").unwrap(), None);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_invalidate_falls_back_to_prefix() {
        let store: Arc<dyn KeyValueStore> = Arc::new(ListingStore(InMemoryStore::new()));
        let posts = TaggedNamespace::for_subject(store.clone(), "posts");
        posts.clone().with_prefix(["x"]).put("a", &1).unwrap();
        posts.put("b", &2).unwrap();
        store.set("postscript/c", b"1".to_vec(), None).unwrap();

        assert_eq!(posts.invalidate(), 2);
        assert!(store.has("postscript/c").unwrap());
    }

    #[test]
    fn test_invalidate_without_capabilities_is_noop() {
        let store: Arc<dyn KeyValueStore> = Arc::new(OpaqueStore(InMemoryStore::new()));
        let posts = TaggedNamespace::for_subject(store, "posts");
        posts.put("a", &1).unwrap();

        assert_eq!(posts.invalidate(), 0);
        assert_eq!(posts.get::<i32>("a").unwrap(), Some(1));
    }

    #[test]
    fn test_invalidate_untagged_is_noop() {
        let ns = TaggedNamespace::new(memory());
        ns.put("a", &1).unwrap();
        assert_eq!(ns.invalidate(), 0);
        assert_eq!(ns.caching_key("a"), "a");
    }
}
