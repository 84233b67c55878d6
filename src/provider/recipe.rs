//! Construction recipes for the built-in providers.
//!
//! The configuration file lists providers in chain order; each entry names a
//! provider and describes how to build it. Recipes become registry factories,
//! so nothing is constructed until a request first needs the provider.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    ApiKeyProvider, BasicProvider, BasicUser, DEFAULT_API_KEY_HEADER, JwtProvider, JwtSettings,
    Provider, ProviderFactory, ProviderRegistry, hash_api_key,
};
use crate::config::expand_env_vars;
use crate::error::ConfigurationError;
use crate::types::{ProviderName, SecretHash};

/// One `providers[]` entry of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: ProviderName,
    #[serde(flatten)]
    pub recipe: ProviderRecipe,
}

/// How to build a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProviderRecipe {
    Basic {
        #[serde(default)]
        realm: Option<String>,
        #[serde(default)]
        users: Vec<BasicUser>,
    },
    Jwt(JwtSettings),
    ApiKey {
        #[serde(default)]
        header: Option<String>,
        /// Plain key (usually `${ENV_VAR}`)
        #[serde(default)]
        key: Option<String>,
        /// Digest of the key, preferred over `key`
        #[serde(default)]
        key_sha256: Option<SecretHash>,
        #[serde(default)]
        display_name: Option<String>,
    },
}

impl ProviderRecipe {
    /// Short label for logs and `check-config` output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::Jwt(_) => "jwt",
            Self::ApiKey { .. } => "api_key",
        }
    }

    /// Expand `${VAR}` references in secret-bearing fields.
    pub fn expand_env(self) -> Self {
        match self {
            Self::Jwt(mut settings) => {
                settings.secret = expand_env_vars(&settings.secret);
                settings.issuer = settings.issuer.map(|s| expand_env_vars(&s));
                settings.audience = settings.audience.map(|s| expand_env_vars(&s));
                Self::Jwt(settings)
            }
            Self::ApiKey {
                header,
                key,
                key_sha256,
                display_name,
            } => Self::ApiKey {
                header,
                key: key.map(|k| expand_env_vars(&k)),
                key_sha256: key_sha256.map(|h| SecretHash::new(expand_env_vars(h.as_str()))),
                display_name,
            },
            other => other,
        }
    }

    /// Check the recipe can be built, without building it.
    pub fn validate(&self, name: &ProviderName) -> Result<(), ConfigurationError> {
        let invalid = |message: &str| ConfigurationError::InvalidProvider {
            provider: name.clone(),
            message: message.to_string(),
        };

        match self {
            Self::Jwt(settings) if settings.secret.is_empty() => {
                Err(invalid("jwt provider requires a non-empty `secret`"))
            }
            Self::ApiKey {
                key, key_sha256, ..
            } => match (key, key_sha256) {
                (None, None) => Err(invalid("api_key provider requires `key` or `keySha256`")),
                (Some(_), Some(_)) => Err(invalid("set only one of `key` and `keySha256`")),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Turn the recipe into a registry factory.
    pub fn into_factory(self) -> ProviderFactory {
        Box::new(move || -> anyhow::Result<Arc<dyn Provider>> {
            match &self {
                Self::Basic { realm, users } => {
                    let mut provider = BasicProvider::new(users.iter().cloned());
                    if let Some(realm) = realm {
                        provider = provider.with_realm(realm);
                    }
                    Ok(Arc::new(provider))
                }
                Self::Jwt(settings) => Ok(Arc::new(JwtProvider::new(settings)?)),
                Self::ApiKey {
                    header,
                    key,
                    key_sha256,
                    display_name,
                } => {
                    let hash = match (key_sha256, key) {
                        (Some(hash), _) => hash.clone(),
                        (None, Some(key)) => hash_api_key(key),
                        (None, None) => anyhow::bail!("api_key provider has no key configured"),
                    };
                    let mut provider = ApiKeyProvider::new(hash)
                        .with_header(header.as_deref().unwrap_or(DEFAULT_API_KEY_HEADER))?;
                    if let Some(name) = display_name {
                        provider = provider.with_display_name(name.clone());
                    }
                    Ok(Arc::new(provider))
                }
            }
        })
    }
}

/// Build a registry from configured providers, keeping their order.
///
/// Unlike programmatic registration, a file that declares the same name twice
/// is rejected.
pub fn build_registry(configs: &[ProviderConfig]) -> Result<ProviderRegistry, ConfigurationError> {
    let mut seen = HashSet::new();
    let mut registry = ProviderRegistry::new();

    for config in configs {
        if !seen.insert(config.name.clone()) {
            return Err(ConfigurationError::DuplicateProvider(config.name.clone()));
        }
        let recipe = config.recipe.clone().expand_env();
        recipe.validate(&config.name)?;
        registry.insert(config.name.clone(), recipe.into_factory());
    }

    Ok(registry)
}
