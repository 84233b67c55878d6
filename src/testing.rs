//! Test doubles shared by unit and integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method, Uri};

use crate::auth::Principal;
use crate::error::ProviderError;
use crate::provider::{AuthRequest, Provider, RouteInfo};

/// Provider with a fixed outcome that counts its calls.
pub(crate) struct StubProvider {
    outcome: Result<Principal, ProviderError>,
    calls: Arc<AtomicUsize>,
    challenge: Option<&'static str>,
}

impl StubProvider {
    pub(crate) fn accept(id: &str) -> Self {
        Self::with_outcome(Ok(Principal::user(id, "stub")))
    }

    pub(crate) fn reject(reason: &str) -> Self {
        Self::with_outcome(Err(ProviderError::unauthorized(reason)))
    }

    pub(crate) fn bad_request(reason: &str) -> Self {
        Self::with_outcome(Err(ProviderError::bad_request(reason)))
    }

    pub(crate) fn internal(reason: &str) -> Self {
        Self::with_outcome(Err(ProviderError::internal(reason)))
    }

    fn with_outcome(outcome: Result<Principal, ProviderError>) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            challenge: None,
        }
    }

    pub(crate) fn with_challenge(mut self, scheme: &'static str) -> Self {
        self.challenge = Some(scheme);
        self
    }

    /// Shared handle to the call counter; grab it before registering.
    pub(crate) fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn authenticate(
        &self,
        _request: &AuthRequest,
        _route: &RouteInfo,
    ) -> Result<Principal, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn challenge(&self) -> Option<&str> {
        self.challenge
    }
}

pub(crate) fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

pub(crate) fn request(authorization: Option<&str>) -> AuthRequest {
    let mut headers = HeaderMap::new();
    if let Some(value) = authorization {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    }
    AuthRequest::new(Method::GET, Uri::from_static("/api/v1/posts"), headers)
}

pub(crate) fn route() -> RouteInfo {
    RouteInfo::new(Method::GET, "/api/v1/posts")
}
