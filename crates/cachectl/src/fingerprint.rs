//! Request fingerprints and the storage keys derived from them.

use std::collections::BTreeMap;
use std::fmt;

use cachectl_core::RequestContext;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Deterministic identity of a request under a given Vary set and scope.
///
/// Two requests get the same fingerprint exactly when they agree on method,
/// path, parameters, identity, locale, and the values of every Vary-listed
/// header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheFingerprint(String);

impl CacheFingerprint {
    /// Compute the fingerprint of `request`.
    ///
    /// Header names in `vary` are matched case-insensitively; headers the
    /// request does not carry are left out.
    pub fn compute(request: &RequestContext, vary: &[String], identity: Option<&str>) -> Self {
        let mut headers: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for name in vary {
            let values: Vec<&str> = request.headers.get_all(name).collect();
            if !values.is_empty() {
                headers.insert(name.to_ascii_lowercase(), values);
            }
        }

        let canonical = json!({
            "method": request.method.as_str(),
            "path": request.path,
            "params": request.params,
            "identity": identity,
            "vary": headers,
            "locale": request.locale,
        });

        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the stored ETag.
    pub fn etag_key(&self) -> String {
        format!("{}/etag", self.0)
    }

    /// Key of the stored Last-Modified time.
    pub fn last_modified_key(&self) -> String {
        format!("{}/last_modified", self.0)
    }

    /// Key of the stored body.
    pub fn content_key(&self) -> String {
        format!("{}/content", self.0)
    }
}

impl fmt::Display for CacheFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachectl_core::Method;

    fn vary(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fp(request: &RequestContext, names: &[&str]) -> CacheFingerprint {
        CacheFingerprint::compute(request, &vary(names), None)
    }

    // === Stability ===

    #[test]
    fn test_same_request_same_fingerprint() {
        let a = RequestContext::get("/posts").with_param("page", "1");
        let b = RequestContext::get("posts/").with_param("page", "1");
        assert_eq!(fp(&a, &[]), fp(&b, &[]));
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let f = fp(&RequestContext::get("/"), &[]);
        assert_eq!(f.as_str().len(), 64);
        assert!(f.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_non_vary_header_ignored() {
        let a = RequestContext::get("/posts").with_header("X-Request-Id", "1");
        let b = RequestContext::get("/posts").with_header("X-Request-Id", "2");
        assert_eq!(fp(&a, &["Accept-Language"]), fp(&b, &["Accept-Language"]));
    }

    #[test]
    fn test_vary_name_case_insensitive() {
        let a = RequestContext::get("/").with_header("accept-language", "de");
        let b = RequestContext::get("/").with_header("Accept-Language", "de");
        assert_eq!(fp(&a, &["ACCEPT-LANGUAGE"]), fp(&b, &["accept-language"]));
    }

    #[test]
    fn test_param_order_irrelevant() {
        let a = RequestContext::get("/").with_param("a", "1").with_param("b", "2");
        let b = RequestContext::get("/").with_param("b", "2").with_param("a", "1");
        assert_eq!(fp(&a, &[]), fp(&b, &[]));
    }

    // === Sensitivity ===

    #[test]
    fn test_vary_header_value_changes_fingerprint() {
        let a = RequestContext::get("/").with_header("Accept-Language", "en");
        let b = RequestContext::get("/").with_header("Accept-Language", "de");
        assert_ne!(fp(&a, &["Accept-Language"]), fp(&b, &["Accept-Language"]));
    }

    #[test]
    fn test_identity_changes_fingerprint() {
        let req = RequestContext::get("/");
        let v = vary(&[]);
        assert_ne!(
            CacheFingerprint::compute(&req, &v, Some("1")),
            CacheFingerprint::compute(&req, &v, Some("2"))
        );
        assert_ne!(
            CacheFingerprint::compute(&req, &v, Some("1")),
            CacheFingerprint::compute(&req, &v, None)
        );
    }

    #[test]
    fn test_method_path_params_locale_change_fingerprint() {
        let base = RequestContext::get("/posts");
        let f = fp(&base, &[]);
        assert_ne!(f, fp(&RequestContext::new(Method::HEAD, "/posts"), &[]));
        assert_ne!(f, fp(&RequestContext::get("/users"), &[]));
        assert_ne!(f, fp(&base.clone().with_param("page", "2"), &[]));
        assert_ne!(f, fp(&base.with_locale("de"), &[]));
    }

    #[test]
    fn test_query_string_changes_fingerprint() {
        let rust = RequestContext::get("/search?q=rust");
        let go = RequestContext::get("/search?q=go");
        assert_ne!(fp(&rust, &[]), fp(&go, &[]));
        assert_ne!(fp(&rust, &[]), fp(&RequestContext::get("/search"), &[]));
        assert_eq!(
            fp(&rust, &[]),
            fp(&RequestContext::get("/search").with_param("q", "rust"), &[])
        );
    }

    #[test]
    fn test_repeated_param_changes_fingerprint() {
        let both = RequestContext::get("/posts")
            .with_param("tag", "a")
            .with_param("tag", "b");
        let last = RequestContext::get("/posts").with_param("tag", "b");
        let swapped = RequestContext::get("/posts?tag=b&tag=a");
        assert_ne!(fp(&both, &[]), fp(&last, &[]));
        assert_ne!(fp(&both, &[]), fp(&swapped, &[]));
        assert_eq!(fp(&both, &[]), fp(&RequestContext::get("/posts?tag=a&tag=b"), &[]));
    }

    // === Keys ===

    #[test]
    fn test_sub_keys() {
        let f = fp(&RequestContext::get("/"), &[]);
        assert_eq!(f.etag_key(), format!("{f}/etag"));
        assert_eq!(f.last_modified_key(), format!("{f}/last_modified"));
        assert_eq!(f.content_key(), format!("{f}/content"));
    }
}
