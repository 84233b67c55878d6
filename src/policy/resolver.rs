//! Effective protection policy of a route from its declared scopes.

use std::collections::HashSet;

use super::{ControllerProtection, ProtectionOptions, ProviderSelection, RouteProtectionPolicy};
use crate::error::ConfigurationError;
use crate::provider::ProviderRegistry;
use crate::types::ProviderName;

/// The scopes that apply to one route, least specific first.
#[derive(Debug, Clone, Default)]
pub struct RouteScopes {
    route: String,
    layers: Vec<ProtectionOptions>,
}

impl RouteScopes {
    /// `route` labels the route in configuration errors.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            layers: Vec::new(),
        }
    }

    /// Add an enclosing group. Call outermost first.
    pub fn group(mut self, options: ProtectionOptions) -> Self {
        self.layers.push(options);
        self
    }

    pub fn route_options(mut self, options: ProtectionOptions) -> Self {
        self.layers.push(options);
        self
    }

    /// Add what `controller` declares for `method`.
    pub fn controller(mut self, controller: &ControllerProtection, method: &str) -> Self {
        self.layers.push(controller.options_for(method));
        self
    }

    pub fn label(&self) -> &str {
        &self.route
    }
}

/// Merges declared scopes into the effective policy of a route.
#[derive(Debug, Clone)]
pub struct RouteProtectionResolver {
    default_protected: bool,
    known: HashSet<ProviderName>,
}

impl RouteProtectionResolver {
    /// Provider names are checked against `registry` as it is now.
    pub fn new(default_protected: bool, registry: &ProviderRegistry) -> Self {
        Self {
            default_protected,
            known: registry.names().cloned().collect(),
        }
    }

    /// Policy of a route nothing was declared for.
    pub fn default_policy(&self) -> RouteProtectionPolicy {
        RouteProtectionPolicy::new(self.default_protected, ProviderSelection::All)
    }

    /// Resolve the effective policy for one route.
    ///
    /// Every provider list declared on any scope is validated, including
    /// ones a more specific scope overrides.
    pub fn resolve(&self, scopes: &RouteScopes) -> Result<RouteProtectionPolicy, ConfigurationError> {
        for layer in &scopes.layers {
            if let Some(list) = &layer.providers {
                self.validate(&scopes.route, list)?;
            }
        }

        let protected = scopes
            .layers
            .iter()
            .rev()
            .find_map(|layer| layer.protected)
            .unwrap_or(self.default_protected);

        let providers = scopes
            .layers
            .iter()
            .rev()
            .find_map(|layer| layer.providers.clone())
            .map(ProviderSelection::Only)
            .unwrap_or(ProviderSelection::All);

        Ok(RouteProtectionPolicy::new(protected, providers))
    }

    fn validate(&self, route: &str, list: &[ProviderName]) -> Result<(), ConfigurationError> {
        if list.is_empty() {
            return Err(ConfigurationError::EmptyProviderList {
                route: route.to_string(),
            });
        }
        let mut seen = HashSet::new();
        for name in list {
            if !self.known.contains(name) {
                return Err(ConfigurationError::UnknownProvider {
                    route: route.to_string(),
                    provider: name.clone(),
                });
            }
            if !seen.insert(name) {
                return Err(ConfigurationError::RepeatedProvider {
                    route: route.to_string(),
                    provider: name.clone(),
                });
            }
        }
        Ok(())
    }
}
