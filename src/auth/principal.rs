//! Authenticated identity returned by a provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{PrincipalId, ProviderName};

/// Whether the principal is a human user or a machine client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Client,
}

/// Identity produced by a successful provider.
///
/// The negotiation layer treats this as opaque; it is created by a provider
/// and owned by the request's `AuthContext` until the request ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier (username, token subject, key digest)
    id: PrincipalId,
    /// User or client
    kind: PrincipalKind,
    /// Provider that authenticated this principal
    provider: ProviderName,
    /// Optional email for display
    email: Option<String>,
    /// Optional display name
    display_name: Option<String>,
    /// Free-form attributes a provider wants to pass along (e.g., scopes)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
}

impl Principal {
    /// Create a user principal.
    pub fn user(id: impl Into<PrincipalId>, provider: impl Into<ProviderName>) -> Self {
        Self::new(id, PrincipalKind::User, provider)
    }

    /// Create a client principal.
    pub fn client(id: impl Into<PrincipalId>, provider: impl Into<ProviderName>) -> Self {
        Self::new(id, PrincipalKind::Client, provider)
    }

    fn new(
        id: impl Into<PrincipalId>,
        kind: PrincipalKind,
        provider: impl Into<ProviderName>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            provider: provider.into(),
            email: None,
            display_name: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Re-stamp the provider; used when a shared resolver built the principal.
    pub fn with_provider(mut self, provider: impl Into<ProviderName>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn id(&self) -> &PrincipalId {
        &self.id
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn provider(&self) -> &ProviderName {
        &self.provider
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Check if this principal is a machine client.
    pub fn is_client(&self) -> bool {
        self.kind == PrincipalKind::Client
    }

    /// Get a display-friendly name for this principal.
    pub fn display(&self) -> String {
        if let Some(name) = &self.display_name {
            name.clone()
        } else if let Some(email) = &self.email {
            email.clone()
        } else {
            self.id.to_string()
        }
    }
}
