//! Policy configuration files.
//!
//! Only declarative settings live here. Explicit ETag, Last-Modified and
//! identity resolvers are attached to the resulting [`CachingPolicy`] in code.
//!
//! ```toml
//! etag = "implicit"
//! remember = true
//! ttl_secs = 3600
//! vary = ["Accept-Language"]
//! scope = "public"
//!
//! [cache_control]
//! max_age = 60
//! must_revalidate = true
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::directives::CacheControlDirectives;
use crate::error::{CacheControlError, CacheControlResult};
use crate::policy::CachingPolicy;

/// How the ETag is derived when configured from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EtagMode {
    #[default]
    Off,
    Implicit,
}

/// Sharing mode of cached entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    Public,
    Private,
}

/// Declarative policy settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// ETag derivation.
    pub etag: EtagMode,

    /// Whether bodies are cached and offered back to the producer.
    pub remember: bool,

    /// Lifetime of stored entries. Absent means no expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,

    /// Request headers that partition the cache.
    pub vary: Vec<String>,

    /// Public or private entries. Absent leaves the directives untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeMode>,

    /// `Cache-Control` directives.
    pub cache_control: DirectivesConfig,
}

/// `Cache-Control` directives as written in a config file. Ages are seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectivesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_maxage: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_while_revalidate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_if_error: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_revalidate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_store: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_transform: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_revalidate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_understand: Option<bool>,
}

impl DirectivesConfig {
    /// Convert into the directive set used by the engine.
    pub fn into_directives(self) -> CacheControlDirectives {
        CacheControlDirectives {
            max_age: self.max_age.map(Into::into),
            s_maxage: self.s_maxage.map(Into::into),
            stale_while_revalidate: self.stale_while_revalidate.map(Into::into),
            stale_if_error: self.stale_if_error.map(Into::into),
            public: self.public,
            private: self.private,
            must_revalidate: self.must_revalidate,
            no_cache: self.no_cache,
            no_store: self.no_store,
            no_transform: self.no_transform,
            proxy_revalidate: self.proxy_revalidate,
            immutable: self.immutable,
            must_understand: self.must_understand,
        }
    }
}

impl PolicyConfig {
    /// Load a config file. `.json` files are read as JSON, anything else as
    /// TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)
                .with_context(|| format!("Failed to parse JSON policy: {}", path.display()))
        } else {
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse TOML policy: {}", path.display()))
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Build and validate the policy.
    pub fn into_policy(self) -> CacheControlResult<CachingPolicy> {
        if let Some(ttl) = self.ttl_secs {
            if ttl == 0 {
                return Err(CacheControlError::Configuration(
                    "ttl_secs must be positive; omit it to keep entries forever".to_string(),
                ));
            }
        }

        let mut policy = CachingPolicy::new()
            .cache_control(self.cache_control.into_directives())
            .remember_body(self.remember)
            .vary(self.vary);

        if self.etag == EtagMode::Implicit {
            policy = policy.etag();
        }
        if let Some(ttl) = self.ttl_secs {
            policy = policy.ttl(ttl);
        }
        policy = match self.scope {
            Some(ScopeMode::Public) => policy.public(),
            Some(ScopeMode::Private) => policy.private(),
            None => policy,
        };

        policy.validate()?;
        Ok(policy)
    }
}
