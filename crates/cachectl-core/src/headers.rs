//! Case-insensitive header map.

use std::fmt;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Header names used by the conditional cache.
pub mod header_names {
    /// Entity tag of the representation.
    pub const ETAG: &str = "ETag";
    /// Date the representation was last modified.
    pub const LAST_MODIFIED: &str = "Last-Modified";
    /// Date after which the response is considered stale.
    pub const EXPIRES: &str = "Expires";
    /// Caching directives.
    pub const CACHE_CONTROL: &str = "Cache-Control";
    /// Request headers the response depends on.
    pub const VARY: &str = "Vary";
    /// Conditional request on entity tags.
    pub const IF_NONE_MATCH: &str = "If-None-Match";
    /// Conditional request on modification date.
    pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
    /// Media type of the body.
    pub const CONTENT_TYPE: &str = "Content-Type";
    /// Length of the body in bytes.
    pub const CONTENT_LENGTH: &str = "Content-Length";
}

/// A case-insensitive, multi-value header map over [`http::HeaderMap`].
///
/// A name may carry several values, kept in insertion order, which is how
/// `If-None-Match` and `Vary` may legitimately arrive. Names and values that
/// are not valid HTTP are dropped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: HeaderMap,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header entry. Existing values for the same name are kept.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some((name, value)) = parse_entry(name.into(), value.into()) {
            self.inner.append(name, value);
        }
    }

    /// Replace every value of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if let Some((name, value)) = parse_entry(name.into(), value.into()) {
            self.inner.insert(name, value);
        }
    }

    /// First value for the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values for the given name, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .get_all(name)
            .into_iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Remove every entry with the given name. Returns `true` if any were removed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.inner.remove(name).is_some()
    }

    /// Check whether at least one entry has the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Number of entries (not unique names).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over `(name, value)` pairs. Names are lower-case.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v)))
    }

    /// The underlying [`HeaderMap`].
    pub fn as_header_map(&self) -> &HeaderMap {
        &self.inner
    }
}

fn parse_entry(name: String, value: String) -> Option<(HeaderName, HeaderValue)> {
    let parsed_name = match HeaderName::try_from(name) {
        Ok(name) => name,
        Err(err) => {
            warn!(error = %err, "dropping header with invalid name");
            return None;
        }
    };
    match HeaderValue::try_from(value) {
        Ok(value) => Some((parsed_name, value)),
        Err(err) => {
            warn!(header = %parsed_name, error = %err, "dropping header with invalid value");
            None
        }
    }
}

impl From<HeaderMap> for Headers {
    fn from(inner: HeaderMap) -> Self {
        Self { inner }
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
