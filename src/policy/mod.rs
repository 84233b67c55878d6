//! Route protection policies.
//!
//! Protection is declared at several scopes (global default, nested route
//! groups, individual routes, controller directives) and merged into one
//! [`RouteProtectionPolicy`] per route when the route table is compiled.
//!
//! ## Precedence
//!
//! Each field is resolved independently, most specific scope first:
//!
//! 1. controller directive for the route's method
//! 2. the route's own options
//! 3. enclosing groups, innermost first
//! 4. the global default (unprotected, all providers)

mod controller;
mod resolver;
mod table;

pub use controller::{ControllerDirective, ControllerProtection, Selector};
pub use resolver::{RouteProtectionResolver, RouteScopes};
pub use table::{RouteKey, RouteTable};

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::ProviderName;

/// Which providers a route may be authenticated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSelection {
    /// Every registered provider, in registration order.
    All,
    /// Exactly these providers, in this order.
    Only(Vec<ProviderName>),
}

/// Effective protection of one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteProtectionPolicy {
    protected: bool,
    providers: ProviderSelection,
}

impl RouteProtectionPolicy {
    pub fn new(protected: bool, providers: ProviderSelection) -> Self {
        Self {
            protected,
            providers,
        }
    }

    /// Optional authentication with every provider.
    pub fn unprotected() -> Self {
        Self::new(false, ProviderSelection::All)
    }

    /// Required authentication with every provider.
    pub fn protected() -> Self {
        Self::new(true, ProviderSelection::All)
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn providers(&self) -> &ProviderSelection {
        &self.providers
    }
}

impl fmt::Display for RouteProtectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.protected {
            "protected"
        } else {
            "optional"
        };
        match &self.providers {
            ProviderSelection::All => write!(f, "{} (all providers)", level),
            ProviderSelection::Only(names) => {
                let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
                write!(f, "{} ({})", level, names.join(" -> "))
            }
        }
    }
}

/// Options declared at a single scope. `None` defers to the enclosing scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    /// Accepts `["basic", "jwt"]`, `"basic"` or `"basic|jwt"`.
    #[serde(
        default,
        deserialize_with = "deserialize_provider_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub providers: Option<Vec<ProviderName>>,
}

impl ProtectionOptions {
    pub fn protected(protected: bool) -> Self {
        Self {
            protected: Some(protected),
            providers: None,
        }
    }

    pub fn providers<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ProviderName>,
    {
        Self {
            protected: None,
            providers: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_providers<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ProviderName>,
    {
        self.providers = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.protected.is_none() && self.providers.is_none()
    }
}

/// A single string or a list of strings in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Split into names; a single string may use `|` separators.
    pub(crate) fn into_names(self) -> Vec<String> {
        match self {
            Self::One(s) => s
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Self::Many(v) => v,
        }
    }
}

fn deserialize_provider_list<'de, D>(deserializer: D) -> Result<Option<Vec<ProviderName>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(raw.map(|list| list.into_names().into_iter().map(ProviderName::from).collect()))
}
