//! Producer results and their resolution into concrete responses.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::context::RequestContext;
use crate::response::Response;

/// Upper bound on `Resolvable` indirections followed for one reply.
pub const MAX_RESOLVE_DEPTH: usize = 16;

/// Errors raised while resolving a [`Reply`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The chain of resolvables did not reach a response.
    #[error("reply did not resolve to a response within {limit} steps")]
    DepthExceeded { limit: usize },

    /// A resolvable failed.
    #[error("failed to resolve reply: {0}")]
    Failed(#[source] anyhow::Error),
}

/// A value that can be turned into another [`Reply`] given the request.
///
/// Closures of shape `FnOnce(&RequestContext) -> anyhow::Result<Reply>` are
/// resolvable.
pub trait Resolvable: Send {
    /// Resolve one step.
    fn resolve(self: Box<Self>, request: &RequestContext) -> anyhow::Result<Reply>;
}

impl<F> Resolvable for F
where
    F: FnOnce(&RequestContext) -> anyhow::Result<Reply> + Send,
{
    fn resolve(self: Box<Self>, request: &RequestContext) -> anyhow::Result<Reply> {
        (*self)(request)
    }
}

/// What a content producer hands back.
pub enum Reply {
    /// A concrete response.
    Response(Response),
    /// A value that needs one more resolution step.
    Resolvable(Box<dyn Resolvable>),
}

impl Reply {
    /// A `200 OK` reply carrying the given body.
    pub fn content(body: impl Into<Vec<u8>>) -> Self {
        Self::Response(Response::ok(body))
    }

    /// A `200 OK` JSON reply.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Response::json(value).map(Self::Response)
    }

    /// A reply deferred to a closure that resolves it later.
    pub fn deferred<F>(resolve: F) -> Self
    where
        F: FnOnce(&RequestContext) -> anyhow::Result<Reply> + Send + 'static,
    {
        Self::Resolvable(Box::new(resolve))
    }

    /// Follow resolvables until a response is reached, giving up after
    /// `limit` steps.
    pub fn into_response(
        self,
        request: &RequestContext,
        limit: usize,
    ) -> Result<Response, ResolveError> {
        let mut reply = self;
        let mut depth = 0;

        loop {
            match reply {
                Reply::Response(response) => return Ok(response),
                Reply::Resolvable(next) => {
                    if depth == limit {
                        return Err(ResolveError::DepthExceeded { limit });
                    }
                    depth += 1;
                    reply = next.resolve(request).map_err(ResolveError::Failed)?;
                }
            }
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<String> for Reply {
    fn from(body: String) -> Self {
        Self::content(body)
    }
}

impl From<&str> for Reply {
    fn from(body: &str) -> Self {
        Self::content(body.to_string())
    }
}

impl From<Vec<u8>> for Reply {
    fn from(body: Vec<u8>) -> Self {
        Self::content(body)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(r) => f.debug_tuple("Response").field(r).finish(),
            Self::Resolvable(_) => f.write_str("Resolvable(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> RequestContext {
        RequestContext::get("/")
    }

    #[test]
    fn test_concrete_response_resolves_immediately() {
        let r = Reply::content("hi").into_response(&req(), 0).unwrap();
        assert_eq!(r.body(), b"hi");
    }

    #[test]
    fn test_nested_resolvables() {
        let reply = Reply::deferred(|_| {
            Ok(Reply::deferred(|r| Ok(Reply::content(format!("path={}", r.path)))))
        });

        let r = reply
            .into_response(&RequestContext::get("/posts"), MAX_RESOLVE_DEPTH)
            .unwrap();
        assert_eq!(r.body(), b"path=posts");
    }

    #[test]
    fn test_depth_limit() {
        struct Forever;

        impl Resolvable for Forever {
            fn resolve(self: Box<Self>, _request: &RequestContext) -> anyhow::Result<Reply> {
                Ok(Reply::Resolvable(self))
            }
        }

        let err = Reply::Resolvable(Box::new(Forever))
            .into_response(&req(), 4)
            .unwrap_err();
        assert!(matches!(err, ResolveError::DepthExceeded { limit: 4 }));
    }

    #[test]
    fn test_failed_resolution() {
        let reply = Reply::deferred(|_| Err(anyhow::anyhow!("boom")));
        let err = reply.into_response(&req(), MAX_RESOLVE_DEPTH).unwrap_err();
        assert!(matches!(err, ResolveError::Failed(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_from_conversions() {
        assert!(matches!(Reply::from("x"), Reply::Response(_)));
        assert!(matches!(Reply::from(vec![1u8]), Reply::Response(_)));
        assert!(matches!(Reply::from(Response::default()), Reply::Response(_)));
    }
}
