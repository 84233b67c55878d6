//! HTTP Basic provider.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_key::hash_api_key;
use super::{AuthRequest, AuthorizationHeader, Provider, RouteInfo};
use crate::auth::Principal;
use crate::error::ProviderError;
use crate::types::SecretHash;

/// A user allowed to authenticate with Basic credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicUser {
    pub username: String,
    /// SHA-256 hex digest of the password
    pub password_sha256: SecretHash,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl BasicUser {
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            password_sha256: hash_api_key(password),
            display_name: None,
            email: None,
        }
    }
}

/// Verifies `Authorization: Basic base64(user:password)` against known users.
#[derive(Debug, Clone)]
pub struct BasicProvider {
    users: HashMap<String, BasicUser>,
    challenge: String,
}

impl BasicProvider {
    pub fn new(users: impl IntoIterator<Item = BasicUser>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|u| (u.username.clone(), u))
                .collect(),
            challenge: "Basic realm=\"api\"".to_string(),
        }
    }

    pub fn with_realm(mut self, realm: &str) -> Self {
        self.challenge = format!("Basic realm=\"{}\"", realm);
        self
    }

    fn decode(credentials: &str) -> Result<(String, String), ProviderError> {
        let bytes = STANDARD
            .decode(credentials)
            .map_err(|_| ProviderError::bad_request("basic credentials are not valid base64"))?;
        let decoded = String::from_utf8(bytes)
            .map_err(|_| ProviderError::bad_request("basic credentials are not valid UTF-8"))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| ProviderError::bad_request("basic credentials are missing a `:`"))?;
        Ok((username.to_string(), password.to_string()))
    }
}

impl AuthorizationHeader for BasicProvider {
    fn authorization_scheme(&self) -> &str {
        "Basic"
    }
}

#[async_trait]
impl Provider for BasicProvider {
    async fn authenticate(
        &self,
        request: &AuthRequest,
        _route: &RouteInfo,
    ) -> Result<Principal, ProviderError> {
        let credentials = self.authorization_credentials(request)?;
        let (username, password) = Self::decode(credentials)?;

        let user = self
            .users
            .get(&username)
            .filter(|u| u.password_sha256 == hash_api_key(&password))
            .ok_or_else(|| ProviderError::unauthorized("Invalid username or password"))?;

        debug!("Basic credentials verified for user: {}", username);

        Ok(Principal::user(user.username.clone(), "basic")
            .with_email(user.email.clone())
            .with_display_name(user.display_name.clone()))
    }

    fn challenge(&self) -> Option<&str> {
        Some(&self.challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{request, route};

    fn provider() -> BasicProvider {
        let mut alice = BasicUser::new("alice", "wonderland");
        alice.display_name = Some("Alice".to_string());
        BasicProvider::new([alice])
    }

    fn basic(user_pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(user_pass))
    }

    #[tokio::test]
    async fn test_valid_credentials() {
        let principal = provider()
            .authenticate(&request(Some(&basic("alice:wonderland"))), &route())
            .await
            .unwrap();

        assert_eq!(principal.id().as_str(), "alice");
        assert_eq!(principal.display(), "Alice");
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let err = provider()
            .authenticate(&request(Some(&basic("alice:looking-glass"))), &route())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::unauthorized("Invalid username or password"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_unauthorized() {
        let err = provider()
            .authenticate(&request(Some(&basic("mallory:wonderland"))), &route())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let err = provider()
            .authenticate(&request(Some("Basic %%%")), &route())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::BadRequest(_)));

        let err = provider()
            .authenticate(&request(Some(&basic("no-colon"))), &route())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_bearer_header_is_bad_request() {
        let err = provider()
            .authenticate(&request(Some("Bearer token")), &route())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::BadRequest(_)));
    }

    #[test]
    fn test_challenge_carries_realm() {
        let provider = provider().with_realm("internal");
        assert_eq!(provider.challenge(), Some("Basic realm=\"internal\""));
    }
}
