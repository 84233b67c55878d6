// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod provider;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export key types and functions
pub use auth::{AuthContext, AuthOutcome, AuthState, Authenticated, Authenticator, Principal, PrincipalKind};
pub use config::{AuthSettings, load_settings, resolve_config_path};
pub use error::{AuthError, AuthFailure, ConfigurationError, FailureKind, ProviderError};
pub use middleware::{AuthLayerState, CurrentUser, RequiredUser, authenticate};
pub use policy::{
    ControllerProtection, ProtectionOptions, ProviderSelection, RouteProtectionPolicy,
    RouteProtectionResolver, RouteScopes, RouteTable, Selector,
};
pub use provider::{AuthRequest, AuthorizationHeader, Provider, ProviderRegistry, RouteInfo};
pub use types::{ProviderName, PrincipalId};

use axum::Router;

/// Convenience function to build the demo API from loaded settings.
///
/// Builds the provider registry, compiles every route policy, and returns a
/// router with the authentication middleware in place. Configuration errors
/// surface here, before anything is served.
pub fn create_app(settings: &AuthSettings) -> Result<Router, ConfigurationError> {
    let auth = AuthLayerState::from_settings(settings)?;
    Ok(api::create_router(auth))
}
