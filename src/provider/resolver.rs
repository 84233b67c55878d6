//! User and client resolver callbacks.
//!
//! Token-based providers only learn an identifier from the credential. The
//! host application maps that identifier to a principal through a resolver.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::auth::Principal;

/// Maps an identifier to a principal.
///
/// `Ok(None)` means "not found" and is treated by providers as an
/// authentication failure. `Err` is a resolver fault and aborts the chain.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<Option<Principal>>;
}

/// In-memory resolver for fixed principals.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    principals: HashMap<String, Principal>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a principal, keyed by its ID.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals
            .insert(principal.id().as_str().to_string(), principal);
        self
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl UserResolver for StaticUserDirectory {
    async fn resolve(&self, id: &str) -> Result<Option<Principal>> {
        Ok(self.principals.get(id).cloned())
    }
}
