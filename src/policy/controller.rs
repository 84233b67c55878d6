//! Controller-level protection directives.
//!
//! A controller declares an ordered list of directives. For a given method
//! the last matching directive wins, so a blanket `protect` can be followed
//! by targeted `unprotect` carve-outs.

use serde::Deserialize;

use super::{OneOrMany, ProtectionOptions};
use crate::types::ProviderName;

/// Methods a directive applies to. An empty selection means every method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selector {
    #[default]
    All,
    Only(Vec<String>),
}

impl Selector {
    pub fn matches(&self, method: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(methods) => methods.iter().any(|m| m == method),
        }
    }

    fn from_list(methods: Vec<String>) -> Self {
        if methods.is_empty() {
            Self::All
        } else {
            Self::Only(methods)
        }
    }
}

impl From<&str> for Selector {
    fn from(method: &str) -> Self {
        Self::Only(vec![method.to_string()])
    }
}

impl From<Vec<String>> for Selector {
    fn from(methods: Vec<String>) -> Self {
        Self::from_list(methods)
    }
}

impl From<Vec<&str>> for Selector {
    fn from(methods: Vec<&str>) -> Self {
        Self::from_list(methods.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selector {
    fn from(methods: [&str; N]) -> Self {
        Self::from_list(methods.iter().map(|m| m.to_string()).collect())
    }
}

fn selector(raw: Option<OneOrMany>) -> Selector {
    raw.map(|methods| Selector::from_list(methods.into_names()))
        .unwrap_or_default()
}

/// One controller declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "DirectiveRepr")]
pub enum ControllerDirective {
    Protect(Selector),
    Unprotect(Selector),
    AuthenticateWith {
        providers: Vec<ProviderName>,
        methods: Selector,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum DirectiveRepr {
    Protect(Option<OneOrMany>),
    Unprotect(Option<OneOrMany>),
    AuthenticateWith {
        providers: OneOrMany,
        #[serde(default)]
        only: Option<OneOrMany>,
    },
}

impl From<DirectiveRepr> for ControllerDirective {
    fn from(repr: DirectiveRepr) -> Self {
        match repr {
            DirectiveRepr::Protect(sel) => Self::Protect(selector(sel)),
            DirectiveRepr::Unprotect(sel) => Self::Unprotect(selector(sel)),
            DirectiveRepr::AuthenticateWith { providers, only } => Self::AuthenticateWith {
                providers: providers
                    .into_names()
                    .into_iter()
                    .map(ProviderName::from)
                    .collect(),
                methods: selector(only),
            },
        }
    }
}

/// Ordered protection directives of one controller.
///
/// ```ignore
/// let posts = ControllerProtection::new()
///     .protect(Selector::All)
///     .unprotect("index");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ControllerProtection {
    directives: Vec<ControllerDirective>,
}

impl ControllerProtection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect the selected methods (all when the selection is empty).
    pub fn protect(mut self, methods: impl Into<Selector>) -> Self {
        self.directives
            .push(ControllerDirective::Protect(methods.into()));
        self
    }

    /// Remove protection from the selected methods.
    pub fn unprotect(mut self, methods: impl Into<Selector>) -> Self {
        self.directives
            .push(ControllerDirective::Unprotect(methods.into()));
        self
    }

    /// Restrict the selected methods to the given providers, in order.
    pub fn authenticate_with<I, N>(mut self, providers: I, methods: impl Into<Selector>) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ProviderName>,
    {
        self.directives.push(ControllerDirective::AuthenticateWith {
            providers: providers.into_iter().map(Into::into).collect(),
            methods: methods.into(),
        });
        self
    }

    pub fn directives(&self) -> &[ControllerDirective] {
        &self.directives
    }

    /// Protection for `method`, if any directive mentions it.
    pub fn protection_for(&self, method: &str) -> Option<bool> {
        self.directives.iter().rev().find_map(|d| match d {
            ControllerDirective::Protect(sel) if sel.matches(method) => Some(true),
            ControllerDirective::Unprotect(sel) if sel.matches(method) => Some(false),
            _ => None,
        })
    }

    /// Provider restriction for `method`, if any directive mentions it.
    pub fn providers_for(&self, method: &str) -> Option<Vec<ProviderName>> {
        self.directives.iter().rev().find_map(|d| match d {
            ControllerDirective::AuthenticateWith { providers, methods } if methods.matches(method) => {
                Some(providers.clone())
            }
            _ => None,
        })
    }

    /// The options this controller contributes for `method`.
    pub fn options_for(&self, method: &str) -> ProtectionOptions {
        ProtectionOptions {
            protected: self.protection_for(method),
            providers: self.providers_for(method),
        }
    }
}
