//! Compiled per-route policies.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use super::{ProtectionOptions, RouteProtectionPolicy, RouteProtectionResolver, RouteScopes};
use crate::config::{AuthSettings, GroupConfig, RouteConfig};
use crate::error::ConfigurationError;

/// Method and full path of a declared route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub path: String,
}

/// Effective policy for every declared route, computed once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    default: Arc<RouteProtectionPolicy>,
    routes: HashMap<RouteKey, Arc<RouteProtectionPolicy>>,
    order: Vec<RouteKey>,
}

impl RouteTable {
    pub fn new(default: RouteProtectionPolicy) -> Self {
        Self {
            default: Arc::new(default),
            routes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Resolve every route in `settings`.
    ///
    /// Fails on the first invalid route, so a misconfigured application never
    /// starts serving.
    pub fn compile(
        settings: &AuthSettings,
        resolver: &RouteProtectionResolver,
    ) -> Result<Self, ConfigurationError> {
        let mut table = Self::new(resolver.default_policy());
        let mut compiler = Compiler {
            settings,
            resolver,
            table: &mut table,
        };

        for route in &settings.routes {
            compiler.route("", &[], route)?;
        }
        for group in &settings.groups {
            compiler.group("", &[], group)?;
        }

        debug!("Compiled {} route policies", table.len());
        Ok(table)
    }

    /// Register a policy; returns `false` if the route was already present.
    pub fn insert(&mut self, method: Method, path: impl Into<String>, policy: RouteProtectionPolicy) -> bool {
        let key = RouteKey {
            method,
            path: path.into(),
        };
        if self.routes.contains_key(&key) {
            return false;
        }
        self.order.push(key.clone());
        self.routes.insert(key, Arc::new(policy));
        true
    }

    /// Policy for a matched route, or the default for undeclared ones.
    ///
    /// A HEAD request with no HEAD entry of its own gets the GET policy, since
    /// axum serves HEAD through the GET handler.
    pub fn policy_for(&self, method: &Method, path: &str) -> Arc<RouteProtectionPolicy> {
        let mut key = RouteKey {
            method: method.clone(),
            path: path.to_string(),
        };
        if let Some(policy) = self.routes.get(&key) {
            return policy.clone();
        }
        if key.method == Method::HEAD {
            key.method = Method::GET;
            if let Some(policy) = self.routes.get(&key) {
                return policy.clone();
            }
        }
        self.default.clone()
    }

    pub fn default_policy(&self) -> &RouteProtectionPolicy {
        &self.default
    }

    /// Routes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&RouteKey, &RouteProtectionPolicy)> {
        self.order
            .iter()
            .filter_map(|key| self.routes.get(key).map(|p| (key, p.as_ref())))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

struct Compiler<'a> {
    settings: &'a AuthSettings,
    resolver: &'a RouteProtectionResolver,
    table: &'a mut RouteTable,
}

impl Compiler<'_> {
    fn group(
        &mut self,
        prefix: &str,
        enclosing: &[ProtectionOptions],
        group: &GroupConfig,
    ) -> Result<(), ConfigurationError> {
        let prefix = join_path(prefix, &group.prefix);
        let mut scopes = enclosing.to_vec();
        scopes.push(group.options.clone());

        for route in &group.routes {
            self.route(&prefix, &scopes, route)?;
        }
        for inner in &group.groups {
            self.group(&prefix, &scopes, inner)?;
        }
        Ok(())
    }

    fn route(
        &mut self,
        prefix: &str,
        groups: &[ProtectionOptions],
        route: &RouteConfig,
    ) -> Result<(), ConfigurationError> {
        let path = join_path(prefix, &route.path);
        let label = format!("{} {}", route.method.to_uppercase(), path);
        let invalid = |message: String| ConfigurationError::InvalidRoute {
            route: label.clone(),
            message,
        };

        let method = Method::from_bytes(route.method.to_uppercase().as_bytes())
            .map_err(|_| invalid(format!("unsupported method `{}`", route.method)))?;

        let mut scopes = groups
            .iter()
            .cloned()
            .fold(RouteScopes::new(label.clone()), RouteScopes::group)
            .route_options(route.options.clone());

        if let Some(uses) = &route.uses {
            let (controller, action) = uses
                .split_once('@')
                .ok_or_else(|| invalid(format!("`uses` must look like controller@method, got `{}`", uses)))?;
            let protection = self.settings.controllers.get(controller).ok_or_else(|| {
                ConfigurationError::UnknownController {
                    route: label.clone(),
                    controller: controller.to_string(),
                }
            })?;
            scopes = scopes.controller(protection, action);
        }

        let policy = self.resolver.resolve(&scopes)?;
        debug!(route = %label, "policy: {}", policy);

        if !self.table.insert(method, path, policy) {
            return Err(invalid("declared more than once".to_string()));
        }
        Ok(())
    }
}

/// Join a group prefix and a route path into one absolute path.
fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", path),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ProviderSelection;
    use crate::provider::ProviderRegistry;
    use crate::testing::StubProvider;
    use crate::types::ProviderName;

    fn resolver(default_protected: bool) -> RouteProtectionResolver {
        let registry = ProviderRegistry::new()
            .register_provider("basic", StubProvider::accept("a"))
            .register_provider("jwt", StubProvider::accept("b"));
        RouteProtectionResolver::new(default_protected, &registry)
    }

    fn compile(json: &str) -> Result<RouteTable, ConfigurationError> {
        let settings = AuthSettings::from_json(json).unwrap();
        RouteTable::compile(&settings, &resolver(settings.protected))
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", ""), "/");
        assert_eq!(join_path("", "health"), "/health");
        assert_eq!(join_path("/api/v1/", "/posts"), "/api/v1/posts");
        assert_eq!(join_path("/api", "/"), "/api");
    }

    #[test]
    fn test_nested_groups_concatenate_and_override() {
        let table = compile(
            r#"{
                "groups": [{
                    "prefix": "/api",
                    "protected": true,
                    "providers": ["basic"],
                    "groups": [{
                        "prefix": "/v1",
                        "providers": "jwt",
                        "routes": [{"method": "get", "path": "/posts"}]
                    }],
                    "routes": [{"method": "GET", "path": "/ping", "protected": false}]
                }]
            }"#,
        )
        .unwrap();

        let posts = table.policy_for(&Method::GET, "/api/v1/posts");
        assert!(posts.is_protected());
        assert_eq!(
            posts.providers(),
            &ProviderSelection::Only(vec![ProviderName::new("jwt")])
        );

        let ping = table.policy_for(&Method::GET, "/api/ping");
        assert!(!ping.is_protected());

        let keys: Vec<_> = table.iter().map(|(k, _)| k.path.as_str()).collect();
        assert_eq!(keys, vec!["/api/ping", "/api/v1/posts"]);
    }

    #[test]
    fn test_head_falls_back_to_get_policy() {
        let table = compile(
            r#"{
                "routes": [
                    {"method": "GET", "path": "/posts", "protected": true},
                    {"method": "GET", "path": "/feed", "protected": true},
                    {"method": "HEAD", "path": "/feed", "protected": false}
                ]
            }"#,
        )
        .unwrap();

        assert!(table.policy_for(&Method::HEAD, "/posts").is_protected());
        assert!(!table.policy_for(&Method::HEAD, "/feed").is_protected());
        assert!(!table.policy_for(&Method::POST, "/posts").is_protected());
    }

    #[test]
    fn test_undeclared_route_uses_default() {
        let table = compile(r#"{"protected": true}"#).unwrap();
        assert!(table.is_empty());
        assert!(table.policy_for(&Method::DELETE, "/anything").is_protected());
    }

    #[test]
    fn test_controller_carve_out() {
        let table = compile(
            r#"{
                "controllers": {"blog": [{"protect": null}, {"unprotect": "posts"}]},
                "routes": [
                    {"method": "GET", "path": "/posts", "uses": "blog@posts"},
                    {"method": "GET", "path": "/drafts", "uses": "blog@drafts"}
                ]
            }"#,
        )
        .unwrap();

        assert!(!table.policy_for(&Method::GET, "/posts").is_protected());
        assert!(table.policy_for(&Method::GET, "/drafts").is_protected());
    }

    #[test]
    fn test_unknown_provider_fails_compilation() {
        let err = compile(
            r#"{"routes": [{"method": "GET", "path": "/posts", "providers": ["saml"]}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownProvider {
                route: "GET /posts".to_string(),
                provider: ProviderName::new("saml"),
            }
        );
    }

    #[test]
    fn test_repeated_provider_fails_compilation() {
        let err = compile(
            r#"{"routes": [{"method": "GET", "path": "/posts", "providers": "basic|basic"}]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::RepeatedProvider {
                route: "GET /posts".to_string(),
                provider: ProviderName::new("basic"),
            }
        );
    }

    #[test]
    fn test_unknown_controller_fails_compilation() {
        let err = compile(r#"{"routes": [{"method": "GET", "path": "/x", "uses": "nope@index"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownController { ref controller, .. } if controller == "nope"));
    }

    #[test]
    fn test_malformed_routes_rejected() {
        assert!(matches!(
            compile(r#"{"routes": [{"method": "GET", "path": "/x", "uses": "index"}]}"#),
            Err(ConfigurationError::InvalidRoute { .. })
        ));
        assert!(matches!(
            compile(r#"{"routes": [{"method": "GE T", "path": "/x"}]}"#),
            Err(ConfigurationError::InvalidRoute { .. })
        ));
        assert!(matches!(
            compile(
                r#"{"routes": [{"method": "GET", "path": "/x"}, {"method": "GET", "path": "x"}]}"#
            ),
            Err(ConfigurationError::InvalidRoute { .. })
        ));
    }
}
