//! `Cache-Control` directives.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A directive value measured in seconds.
///
/// Durations and absolute times are converted to seconds from "now" when the
/// directives are rendered. Past times render as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveAge {
    Seconds(i64),
    Duration(Duration),
    At(DateTime<Utc>),
}

impl DirectiveAge {
    /// Seconds this value stands for, measured from `now`.
    pub fn seconds_at(&self, now: DateTime<Utc>) -> i64 {
        let secs = match *self {
            DirectiveAge::Seconds(secs) => secs,
            DirectiveAge::Duration(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            DirectiveAge::At(at) => (at - now).num_seconds(),
        };
        secs.max(0)
    }
}

impl From<i64> for DirectiveAge {
    fn from(secs: i64) -> Self {
        DirectiveAge::Seconds(secs)
    }
}

impl From<u32> for DirectiveAge {
    fn from(secs: u32) -> Self {
        DirectiveAge::Seconds(i64::from(secs))
    }
}

impl From<Duration> for DirectiveAge {
    fn from(d: Duration) -> Self {
        DirectiveAge::Duration(d)
    }
}

impl From<DateTime<Utc>> for DirectiveAge {
    fn from(at: DateTime<Utc>) -> Self {
        DirectiveAge::At(at)
    }
}

/// The set of `Cache-Control` directives attached to responses.
///
/// Every field is optional; unset fields are left out of both the map and the
/// header.
///
/// ```rust
/// use cachectl::CacheControlDirectives;
///
/// let directives = CacheControlDirectives::new().max_age(0i64);
/// assert_eq!(directives.to_map(), serde_json::json!({"max_age": 0}).as_object().cloned().unwrap());
/// assert_eq!(directives.header_value(), "max-age=0");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControlDirectives {
    pub max_age: Option<DirectiveAge>,
    pub s_maxage: Option<DirectiveAge>,
    pub stale_while_revalidate: Option<DirectiveAge>,
    pub stale_if_error: Option<DirectiveAge>,
    pub public: Option<bool>,
    pub private: Option<bool>,
    pub must_revalidate: Option<bool>,
    pub no_cache: Option<bool>,
    pub no_store: Option<bool>,
    pub no_transform: Option<bool>,
    pub proxy_revalidate: Option<bool>,
    pub immutable: Option<bool>,
    pub must_understand: Option<bool>,
}

impl CacheControlDirectives {
    /// Create an empty directive set.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_age(mut self, age: impl Into<DirectiveAge>) -> Self {
        self.max_age = Some(age.into());
        self
    }

    #[must_use]
    pub fn s_maxage(mut self, age: impl Into<DirectiveAge>) -> Self {
        self.s_maxage = Some(age.into());
        self
    }

    #[must_use]
    pub fn stale_while_revalidate(mut self, age: impl Into<DirectiveAge>) -> Self {
        self.stale_while_revalidate = Some(age.into());
        self
    }

    #[must_use]
    pub fn stale_if_error(mut self, age: impl Into<DirectiveAge>) -> Self {
        self.stale_if_error = Some(age.into());
        self
    }

    /// Mark the response as storable by shared caches. Clears `private`.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.public = Some(true);
        self.private = None;
        self
    }

    /// Mark the response as storable by private caches only. Clears `public`.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.private = Some(true);
        self.public = None;
        self
    }

    #[must_use]
    pub fn must_revalidate(mut self) -> Self {
        self.must_revalidate = Some(true);
        self
    }

    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.no_cache = Some(true);
        self
    }

    #[must_use]
    pub fn no_store(mut self) -> Self {
        self.no_store = Some(true);
        self
    }

    #[must_use]
    pub fn no_transform(mut self) -> Self {
        self.no_transform = Some(true);
        self
    }

    #[must_use]
    pub fn proxy_revalidate(mut self) -> Self {
        self.proxy_revalidate = Some(true);
        self
    }

    #[must_use]
    pub fn immutable(mut self) -> Self {
        self.immutable = Some(true);
        self
    }

    #[must_use]
    pub fn must_understand(mut self) -> Self {
        self.must_understand = Some(true);
        self
    }

    /// Whether no directive is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Underscore-named map of the set directives, ages in seconds from now.
    pub fn to_map(&self) -> Map<String, Value> {
        self.to_map_at(Utc::now())
    }

    /// Underscore-named map of the set directives, ages measured from `now`.
    pub fn to_map_at(&self, now: DateTime<Utc>) -> Map<String, Value> {
        let mut map = Map::new();

        for (name, age) in self.ages() {
            if let Some(age) = age {
                map.insert(name.to_string(), Value::from(age.seconds_at(now)));
            }
        }
        for (name, flag) in self.flags() {
            if let Some(flag) = flag {
                map.insert(name.to_string(), Value::from(flag));
            }
        }
        map
    }

    /// Render the `Cache-Control` header value. Empty when nothing is set.
    pub fn header_value(&self) -> String {
        self.header_value_at(Utc::now())
    }

    /// Render the `Cache-Control` header value with ages measured from `now`.
    pub fn header_value_at(&self, now: DateTime<Utc>) -> String {
        let mut parts: Vec<String> = Vec::new();

        for (name, age) in self.ages() {
            if let Some(age) = age {
                parts.push(format!("{}={}", name.replace('_', "-"), age.seconds_at(now)));
            }
        }

        // private wins when both are requested
        let private = self.private == Some(true) || self.public == Some(false);
        let public = !private && (self.public == Some(true) || self.private == Some(false));
        if public {
            parts.push("public".to_string());
        }
        if private {
            parts.push("private".to_string());
        }

        for (name, flag) in self.flags().into_iter().skip(2) {
            if flag == Some(true) {
                parts.push(name.replace('_', "-"));
            }
        }

        parts.join(", ")
    }

    fn ages(&self) -> [(&'static str, Option<DirectiveAge>); 4] {
        [
            ("max_age", self.max_age),
            ("s_maxage", self.s_maxage),
            ("stale_while_revalidate", self.stale_while_revalidate),
            ("stale_if_error", self.stale_if_error),
        ]
    }

    fn flags(&self) -> [(&'static str, Option<bool>); 9] {
        [
            ("public", self.public),
            ("private", self.private),
            ("must_revalidate", self.must_revalidate),
            ("no_cache", self.no_cache),
            ("no_store", self.no_store),
            ("no_transform", self.no_transform),
            ("proxy_revalidate", self.proxy_revalidate),
            ("immutable", self.immutable),
            ("must_understand", self.must_understand),
        ]
    }
}
