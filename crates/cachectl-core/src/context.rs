//! Request context with the attributes that matter for caching.

use std::collections::BTreeMap;

use http::Method;
use url::form_urlencoded;

use crate::headers::Headers;

/// Query string and body parameters, ordered by name. A name keeps every
/// value it was given, in arrival order.
pub type Params = BTreeMap<String, Vec<String>>;

/// The cache-relevant view of an incoming request.
///
/// Identity and locale are explicit fields: the host resolves the
/// authenticated user and active locale and threads them in here.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method.
    pub method: Method,
    /// Normalized request path (no leading or trailing slash, `/` for root).
    pub path: String,
    /// Query and body parameters.
    pub params: Params,
    /// Request headers.
    pub headers: Headers,
    /// Authenticated user identifier, if any.
    pub user: Option<String>,
    /// Active locale, if the host localizes responses.
    pub locale: Option<String>,
}

impl RequestContext {
    /// Create a new request context.
    ///
    /// A query string in `target` is percent-decoded into [`params`](Self::params).
    pub fn new(method: Method, target: impl AsRef<str>) -> Self {
        let (path, query) = match target.as_ref().split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target.as_ref(), None),
        };

        let mut context = Self {
            method,
            path: normalize_path(path),
            params: Params::new(),
            headers: Headers::new(),
            user: None,
            locale: None,
        };
        if let Some(query) = query {
            for (name, value) in form_urlencoded::parse(query.as_bytes()) {
                context.push_param(name.into_owned(), value.into_owned());
            }
        }
        context
    }

    /// Create a `GET` request context.
    pub fn get(path: impl AsRef<str>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Add a query or body parameter. Earlier values of the same name are kept.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_param(name.into(), value.into());
        self
    }

    fn push_param(&mut self, name: String, value: String) {
        self.params.entry(name).or_default().push(value);
    }

    /// Set the authenticated user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the active locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// First value of a parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a parameter, in arrival order.
    pub fn param_all(&self, name: &str) -> &[String] {
        self.params.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the method is safe (`GET` or `HEAD`), the only methods
    /// that may be answered with `304 Not Modified`.
    pub fn is_safe_method(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

/// Strip surrounding slashes and any query string; the root path is `/`.
pub fn normalize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
