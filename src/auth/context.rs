//! Request-scoped authentication context.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{Authenticated, Authenticator, Principal};
use crate::error::{AuthError, AuthFailure};
use crate::policy::RouteProtectionPolicy;
use crate::provider::{AuthRequest, RouteInfo};
use crate::types::ProviderName;

/// Result of the one chain attempt made for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated {
        principal: Principal,
        provider: ProviderName,
    },
    /// Optional route, nobody authenticated. The declines are kept for logging.
    Anonymous { failure: AuthFailure },
    /// Protected route, nobody authenticated.
    Failed(AuthFailure),
}

/// Where a context is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unresolved,
    Authenticating,
    Authenticated,
    Anonymous,
    Rejected,
}

/// Lazily authenticates one request and remembers the answer.
///
/// Created empty for every request. The first call that needs the principal
/// runs the chain restricted to the route's providers; every later call,
/// from any clone of the context, sees the same outcome. Clones share state,
/// so a context must never be reused for another request.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

struct Inner {
    authenticator: Arc<Authenticator>,
    policy: Arc<RouteProtectionPolicy>,
    request: AuthRequest,
    route: RouteInfo,
    outcome: OnceCell<Result<AuthOutcome, AuthError>>,
    // Chain attempts currently running; a cancelled attempt leaves through `InFlight::drop`.
    in_flight: AtomicUsize,
}

impl AuthContext {
    pub fn new(
        authenticator: Arc<Authenticator>,
        policy: Arc<RouteProtectionPolicy>,
        request: AuthRequest,
        route: RouteInfo,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                authenticator,
                policy,
                request,
                route,
                outcome: OnceCell::new(),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub fn policy(&self) -> &RouteProtectionPolicy {
        &self.inner.policy
    }

    pub fn route(&self) -> &RouteInfo {
        &self.inner.route
    }

    pub fn request(&self) -> &AuthRequest {
        &self.inner.request
    }

    /// Authenticate on first use and return the memoized outcome.
    ///
    /// Provider faults, timeouts and unknown providers are returned as errors
    /// on every route, protected or not.
    pub async fn outcome(&self) -> Result<&AuthOutcome, AuthError> {
        self.inner
            .outcome
            .get_or_init(|| self.run())
            .await
            .as_ref()
            .map_err(Clone::clone)
    }

    async fn run(&self) -> Result<AuthOutcome, AuthError> {
        let inner = &self.inner;
        let _running = InFlight::enter(&inner.in_flight);

        let candidates = inner.authenticator.candidates(inner.policy.providers());
        let attempt = inner
            .authenticator
            .attempt(&inner.request, &inner.route, &candidates)
            .await;

        match attempt {
            Ok(Authenticated {
                principal,
                provider,
            }) => Ok(AuthOutcome::Authenticated {
                principal,
                provider,
            }),
            Err(AuthError::AuthenticationFailed(failure)) if inner.policy.is_protected() => {
                warn!(route = %inner.route, "rejected: {}", failure);
                Ok(AuthOutcome::Failed(failure))
            }
            Err(AuthError::AuthenticationFailed(failure)) => {
                debug!(route = %inner.route, "continuing anonymously");
                Ok(AuthOutcome::Anonymous { failure })
            }
            Err(err) => Err(err),
        }
    }

    /// The principal, if any.
    ///
    /// On a protected route a failed attempt is an error; on an optional
    /// route it is `None`.
    pub async fn user(&self) -> Result<Option<Principal>, AuthError> {
        match self.outcome().await? {
            AuthOutcome::Authenticated { principal, .. } => Ok(Some(principal.clone())),
            AuthOutcome::Anonymous { .. } => Ok(None),
            AuthOutcome::Failed(failure) => Err(AuthError::AuthenticationFailed(failure.clone())),
        }
    }

    /// The principal, failing unless someone authenticated, even on optional routes.
    pub async fn require_user(&self) -> Result<Principal, AuthError> {
        match self.outcome().await? {
            AuthOutcome::Authenticated { principal, .. } => Ok(principal.clone()),
            AuthOutcome::Anonymous { failure } | AuthOutcome::Failed(failure) => {
                Err(AuthError::AuthenticationFailed(failure.clone()))
            }
        }
    }

    /// Whether the request is authenticated. Errors count as `false`.
    pub async fn check(&self) -> bool {
        matches!(self.outcome().await, Ok(AuthOutcome::Authenticated { .. }))
    }

    /// Provider that authenticated the request, once resolved.
    pub fn provider_used(&self) -> Option<&ProviderName> {
        match self.inner.outcome.get() {
            Some(Ok(AuthOutcome::Authenticated { provider, .. })) => Some(provider),
            _ => None,
        }
    }

    /// Current state; never triggers authentication.
    pub fn state(&self) -> AuthState {
        match self.inner.outcome.get() {
            None if self.inner.in_flight.load(Ordering::SeqCst) > 0 => AuthState::Authenticating,
            None => AuthState::Unresolved,
            Some(Ok(AuthOutcome::Authenticated { .. })) => AuthState::Authenticated,
            Some(Ok(AuthOutcome::Anonymous { .. })) => AuthState::Anonymous,
            Some(Ok(AuthOutcome::Failed(_))) | Some(Err(_)) => AuthState::Rejected,
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("route", &self.inner.route)
            .field("policy", &self.inner.policy)
            .field("state", &self.state())
            .finish()
    }
}
