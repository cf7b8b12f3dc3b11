//! Key-value store abstraction with optional capabilities.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::ttl::Ttl;

/// An opaque key-value backend with per-entry expiry.
///
/// Writing with a [`Ttl`] that has already elapsed removes the entry. A
/// `None` TTL keeps the entry until it is deleted or the store is cleared.
///
/// Two capabilities are optional: key iteration ([`keys`](Self::keys)) and
/// tag-scoped flushing ([`tag_index`](Self::tag_index)).
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Expired entries read as absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> StoreResult<()>;

    /// Delete a value. Returns `true` if an entry was removed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove every entry.
    fn clear(&self) -> StoreResult<()>;

    /// Check whether a live entry exists.
    fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Read several values at once, in key order.
    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Write several values with a shared TTL.
    fn set_many(&self, entries: Vec<(String, Vec<u8>)>, ttl: Option<Ttl>) -> StoreResult<()> {
        for (key, value) in entries {
            self.set(&key, value, ttl)?;
        }
        Ok(())
    }

    /// Delete several values. Returns how many entries were removed.
    fn delete_many(&self, keys: &[&str]) -> StoreResult<u64> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// List live keys.
    fn keys(&self) -> StoreResult<Vec<String>> {
        Err(StoreError::Unsupported("key iteration"))
    }

    /// Tag index, if the backend keeps one.
    fn tag_index(&self) -> Option<&dyn TagIndex> {
        None
    }
}

/// Tag bookkeeping for backends that can flush by tag.
pub trait TagIndex {
    /// Associate `key` with every tag in `tags`.
    fn tag_key(&self, tags: &[String], key: &str) -> StoreResult<()>;

    /// Remove every entry associated with any of `tags`.
    fn flush_tags(&self, tags: &[String]) -> StoreResult<u64>;
}

/// Typed access to a [`KeyValueStore`] through JSON.
pub trait JsonStoreExt: KeyValueStore {
    /// Read and deserialize a value.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Serialize and write a value.
    fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Ttl>,
    ) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, ttl)
    }
}

impl<S: KeyValueStore + ?Sized> JsonStoreExt for S {}
