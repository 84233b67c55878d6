//! Chain engine: tries providers in order until one succeeds.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::auth::Principal;
use crate::error::{AuthError, AuthFailure};
use crate::policy::ProviderSelection;
use crate::provider::{AuthRequest, ProviderRegistry, RouteInfo};
use crate::types::ProviderName;

/// A successful chain attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub principal: Principal,
    /// Registered name of the provider that won
    pub provider: ProviderName,
}

/// Runs an ordered set of providers against one request.
///
/// Providers are tried strictly in the given order and never in parallel;
/// the first success stops the chain. Declines are recorded and the chain
/// moves on. Anything else aborts the chain and propagates.
#[derive(Debug, Clone)]
pub struct Authenticator {
    registry: Arc<ProviderRegistry>,
    timeout: Option<Duration>,
}

impl Authenticator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound the whole attempt; exceeding it yields [`AuthError::Timeout`].
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Expand a route's selection into concrete candidate names.
    pub fn candidates(&self, selection: &ProviderSelection) -> Vec<ProviderName> {
        match selection {
            ProviderSelection::All => self.registry.all(),
            ProviderSelection::Only(names) => names.clone(),
        }
    }

    /// Attempt authentication with `candidates`, in order.
    pub async fn attempt(
        &self,
        request: &AuthRequest,
        route: &RouteInfo,
        candidates: &[ProviderName],
    ) -> Result<Authenticated, AuthError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_chain(request, route, candidates))
                .await
                .map_err(|_| {
                    warn!(route = %route, "authentication timed out after {:?}", limit);
                    AuthError::Timeout(limit)
                })?,
            None => self.run_chain(request, route, candidates).await,
        }
    }

    async fn run_chain(
        &self,
        request: &AuthRequest,
        route: &RouteInfo,
        candidates: &[ProviderName],
    ) -> Result<Authenticated, AuthError> {
        let mut failure = AuthFailure::default();

        for name in candidates {
            let provider = self.registry.resolve(name.as_str()).await?;

            match provider.authenticate(request, route).await {
                Ok(principal) => {
                    debug!(provider = %name, route = %route, "request authenticated");
                    return Ok(Authenticated {
                        principal: principal.with_provider(name.clone()),
                        provider: name.clone(),
                    });
                }
                Err(err) => match err.failure_kind() {
                    Some(kind) => {
                        debug!(provider = %name, reason = err.reason(), "provider declined");
                        failure.push(name.clone(), kind, err.reason());
                        if let Some(challenge) = provider.challenge() {
                            failure.add_challenge(challenge);
                        }
                    }
                    None => {
                        warn!(provider = %name, route = %route, "provider failed: {}", err.reason());
                        return Err(AuthError::ProviderInternal {
                            provider: name.clone(),
                            message: err.reason().to_string(),
                        });
                    }
                },
            }
        }

        Err(AuthError::AuthenticationFailed(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, ProviderError};
    use crate::provider::Provider;
    use crate::testing::{StubProvider, calls, request, route};
    use async_trait::async_trait;

    fn names(list: &[&str]) -> Vec<ProviderName> {
        list.iter().map(|n| ProviderName::new(*n)).collect()
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        async fn authenticate(
            &self,
            _request: &AuthRequest,
            _route: &RouteInfo,
        ) -> Result<Principal, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Principal::user("late", "slow"))
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let first = StubProvider::reject("bad password");
        let second = StubProvider::accept("bob");
        let third = StubProvider::accept("carol");
        let (c1, c2, c3) = (first.counter(), second.counter(), third.counter());

        let registry = ProviderRegistry::new()
            .register_provider("basic", first)
            .register_provider("jwt", second)
            .register_provider("api_key", third);
        let auth = Authenticator::new(Arc::new(registry));

        let result = auth
            .attempt(&request(None), &route(), &names(&["basic", "jwt", "api_key"]))
            .await
            .unwrap();

        assert_eq!(result.provider.as_str(), "jwt");
        assert_eq!(result.principal.id().as_str(), "bob");
        assert_eq!(result.principal.provider().as_str(), "jwt");
        assert_eq!((calls(&c1), calls(&c2), calls(&c3)), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_all_failing_records_each_attempt_in_order() {
        let registry = ProviderRegistry::new()
            .register_provider("basic", StubProvider::bad_request("missing authorization header"))
            .register_provider("oauth", StubProvider::reject("token revoked"))
            .register_provider("api_key", StubProvider::reject("Invalid API key"));
        let auth = Authenticator::new(Arc::new(registry));

        let err = auth
            .attempt(&request(None), &route(), &names(&["oauth", "basic", "api_key"]))
            .await
            .unwrap_err();

        let failure = err.failure().unwrap();
        let attempted: Vec<_> = failure.providers().map(|p| p.as_str()).collect();
        assert_eq!(attempted, vec!["oauth", "basic", "api_key"]);
        assert_eq!(failure.attempts()[1].kind, FailureKind::BadRequest);
        assert_eq!(failure.message(), "token revoked");
    }

    #[tokio::test]
    async fn test_basic_fails_oauth_succeeds() {
        let registry = ProviderRegistry::new()
            .register_provider("basic", StubProvider::reject("Invalid username or password"))
            .register_provider("oauth", StubProvider::accept("client-app"));
        let auth = Authenticator::new(Arc::new(registry));

        let result = auth
            .attempt(&request(None), &route(), &names(&["basic", "oauth"]))
            .await
            .unwrap();
        assert_eq!(result.principal.id().as_str(), "client-app");
        assert_eq!(result.provider.as_str(), "oauth");
    }

    #[tokio::test]
    async fn test_internal_error_aborts_chain() {
        let broken = StubProvider::internal("introspection endpoint unreachable");
        let fallback = StubProvider::accept("alice");
        let fallback_calls = fallback.counter();

        let registry = ProviderRegistry::new()
            .register_provider("oauth", broken)
            .register_provider("basic", fallback);
        let auth = Authenticator::new(Arc::new(registry));

        let err = auth
            .attempt(&request(None), &route(), &names(&["oauth", "basic"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::ProviderInternal { ref provider, ref message }
                if provider.as_str() == "oauth" && message == "introspection endpoint unreachable"
        ));
        assert_eq!(calls(&fallback_calls), 0);
    }

    #[tokio::test]
    async fn test_unknown_candidate_propagates() {
        let auth = Authenticator::new(Arc::new(ProviderRegistry::new()));
        let err = auth
            .attempt(&request(None), &route(), &names(&["ghost"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn test_empty_candidates_fail_without_attempts() {
        let auth = Authenticator::new(Arc::new(ProviderRegistry::new()));
        let err = auth.attempt(&request(None), &route(), &[]).await.unwrap_err();
        assert!(err.failure().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_candidates_expand_all_in_registration_order() {
        let registry = ProviderRegistry::new()
            .register_provider("jwt", StubProvider::accept("a"))
            .register_provider("basic", StubProvider::accept("b"));
        let auth = Authenticator::new(Arc::new(registry));

        assert_eq!(auth.candidates(&ProviderSelection::All), names(&["jwt", "basic"]));
        assert_eq!(
            auth.candidates(&ProviderSelection::Only(names(&["basic"]))),
            names(&["basic"])
        );
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_error() {
        let registry = ProviderRegistry::new().register_provider("slow", SlowProvider);
        let auth = Authenticator::new(Arc::new(registry))
            .with_timeout(Some(Duration::from_millis(100)));

        let err = auth
            .attempt(&request(None), &route(), &names(&["slow"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Timeout(d) if d == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_failure_collects_challenges() {
        let registry = ProviderRegistry::new()
            .register_provider("basic", StubProvider::reject("x").with_challenge("Basic realm=\"api\""))
            .register_provider("api_key", StubProvider::reject("y"))
            .register_provider("jwt", StubProvider::bad_request("z").with_challenge("Bearer"));
        let auth = Authenticator::new(Arc::new(registry));

        let all = auth.candidates(&ProviderSelection::All);
        let err = auth.attempt(&request(None), &route(), &all).await.unwrap_err();
        assert_eq!(
            err.failure().unwrap().challenges(),
            &["Basic realm=\"api\"".to_string(), "Bearer".to_string()]
        );
    }
}
