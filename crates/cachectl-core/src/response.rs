//! HTTP response with cache-validator accessors.

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;

use crate::headers::{header_names, Headers};
use crate::httpdate::{format_http_date, parse_http_date};

/// Entity headers dropped from a `304 Not Modified` response.
const NOT_MODIFIED_STRIPPED: [&str; 7] = [
    "Allow",
    "Content-Encoding",
    "Content-Language",
    "Content-Length",
    "Content-MD5",
    "Content-Type",
    "Last-Modified",
];

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl Response {
    /// Create a response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Create a `200 OK` response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// Create a `200 OK` plain-text response.
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok(body.into())
            .with_header(header_names::CONTENT_TYPE, "text/plain; charset=utf-8")
    }

    /// Create a `200 OK` JSON response.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::ok(body).with_header(header_names::CONTENT_TYPE, "application/json"))
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Change the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable response headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// First value of a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response and return the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Whether this is a `304 Not Modified` response.
    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED
    }

    /// Set the `ETag` header. Bare values are quoted; already quoted or
    /// weak (`W/"..."`) values are written as given.
    pub fn set_etag(&mut self, etag: &str) {
        let value = if etag.starts_with('"') || etag.starts_with("W/\"") {
            etag.to_string()
        } else {
            format!("\"{}\"", etag)
        };
        self.headers.set(header_names::ETAG, value);
    }

    /// The raw `ETag` header value.
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(header_names::ETAG)
    }

    /// Set the `Last-Modified` header.
    pub fn set_last_modified(&mut self, time: DateTime<Utc>) {
        self.headers
            .set(header_names::LAST_MODIFIED, format_http_date(time));
    }

    /// The parsed `Last-Modified` header.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.headers
            .get(header_names::LAST_MODIFIED)
            .and_then(parse_http_date)
    }

    /// Set the `Expires` header.
    pub fn set_expires(&mut self, time: DateTime<Utc>) {
        self.headers.set(header_names::EXPIRES, format_http_date(time));
    }

    /// Set the `Vary` header from a list of request header names.
    pub fn set_vary(&mut self, headers: &[String]) {
        if headers.is_empty() {
            self.headers.remove(header_names::VARY);
        } else {
            self.headers.set(header_names::VARY, headers.join(", "));
        }
    }

    /// Set the `Cache-Control` header. An empty value removes it.
    pub fn set_cache_control(&mut self, value: &str) {
        if value.is_empty() {
            self.headers.remove(header_names::CACHE_CONTROL);
        } else {
            self.headers.set(header_names::CACHE_CONTROL, value);
        }
    }

    /// Turn this response into a bodiless `304 Not Modified`.
    pub fn set_not_modified(&mut self) {
        self.status = StatusCode::NOT_MODIFIED;
        self.body.clear();
        for name in NOT_MODIFIED_STRIPPED {
            self.headers.remove(name);
        }
    }
}
