//! Axum integration: the authentication middleware and extractors.
//!
//! ```ignore
//! let state = AuthLayerState::from_settings(&settings)?;
//! let app = Router::new()
//!     .route("/api/v1/posts", get(list_posts))
//!     .route_layer(axum::middleware::from_fn_with_state(state, authenticate));
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, info};

use crate::api::ApiError;
use crate::auth::{AuthContext, Authenticator, Principal};
use crate::config::AuthSettings;
use crate::error::ConfigurationError;
use crate::policy::{RouteProtectionResolver, RouteTable};
use crate::provider::{AuthRequest, RouteInfo, build_registry};

/// Shared state of the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthLayerState {
    authenticator: Arc<Authenticator>,
    routes: Arc<RouteTable>,
}

impl AuthLayerState {
    pub fn new(authenticator: Authenticator, routes: RouteTable) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            routes: Arc::new(routes),
        }
    }

    /// Build the registry and compile every route policy.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, ConfigurationError> {
        let registry = build_registry(&settings.providers)?;
        let resolver = RouteProtectionResolver::new(settings.protected, &registry);
        let routes = RouteTable::compile(settings, &resolver)?;

        info!(
            "Authentication ready: {} providers, {} routes, default {}",
            registry.len(),
            routes.len(),
            routes.default_policy()
        );

        let authenticator = Authenticator::new(Arc::new(registry)).with_timeout(settings.timeout());
        Ok(Self::new(authenticator, routes))
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

/// Attach an [`AuthContext`] to the request and enforce protected routes.
///
/// Apply with `route_layer` so the matched path pattern is known. On
/// protected routes the chain runs here, before the handler; elsewhere it runs
/// only if a handler asks for the user.
pub async fn authenticate(
    State(state): State<AuthLayerState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let path = parts
        .extensions
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let policy = state.routes.policy_for(&parts.method, &path);
    let route = RouteInfo::new(parts.method.clone(), path);
    let auth_request = AuthRequest::from_parts(&parts);

    let ctx = AuthContext::new(state.authenticator.clone(), policy, auth_request, route);

    if ctx.policy().is_protected() {
        let user = ctx.user().await?;
        debug!(
            route = %ctx.route(),
            user = user.as_ref().map(|u| u.id().as_str()).unwrap_or_default(),
            "protected route authenticated"
        );
    }

    parts.extensions.insert(ctx);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

fn context_from(parts: &Parts) -> Result<AuthContext, ApiError> {
    parts.extensions.get::<AuthContext>().cloned().ok_or_else(|| {
        error!("AuthContext not found - auth middleware not configured");
        ApiError::Internal
    })
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context_from(parts)
    }
}

/// The principal if one authenticated; `None` on optional routes otherwise.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = context_from(parts)?;
        Ok(CurrentUser(ctx.user().await?))
    }
}

/// The authenticated principal; rejects with 401 even on optional routes.
#[derive(Debug, Clone)]
pub struct RequiredUser(pub Principal);

impl<S> FromRequestParts<S> for RequiredUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = context_from(parts)?;
        Ok(RequiredUser(ctx.require_user().await?))
    }
}
