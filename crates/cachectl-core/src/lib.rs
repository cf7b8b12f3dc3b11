//! Request and response model for HTTP conditional caching.
//!
//! This crate provides the fundamental types shared by the cache engine:
//! - `RequestContext` - Method, path, parameters, headers, identity and locale
//! - `Headers` - Case-insensitive, multi-value header map
//! - `Response` - Status, headers and body, with validator setters
//! - `Reply` / `Resolvable` - Producer results that may need further resolution
//! - `httpdate` - IMF-fixdate formatting and lenient HTTP-date parsing

mod context;
mod headers;
pub mod httpdate;
mod reply;
mod response;

pub use context::*;
pub use headers::*;
pub use reply::*;
pub use response::*;

pub use http::{Method, StatusCode};
