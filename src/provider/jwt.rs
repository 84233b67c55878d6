//! Bearer JWT provider.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AuthRequest, AuthorizationHeader, Provider, RouteInfo, UserResolver};
use crate::auth::Principal;
use crate::error::ProviderError;

fn default_leeway_seconds() -> u64 {
    60
}

/// Verification settings for HS256 tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtSettings {
    /// Shared HMAC secret
    pub secret: String,
    /// Expected `iss` claim
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp`/`nbf`
    #[serde(default = "default_leeway_seconds")]
    pub leeway_seconds: u64,
}

impl JwtSettings {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            audience: None,
            leeway_seconds: default_leeway_seconds(),
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Space separated scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Verifies `Authorization: Bearer <jwt>` signed with a shared secret.
pub struct JwtProvider {
    key: DecodingKey,
    validation: Validation,
    resolver: Option<Arc<dyn UserResolver>>,
}

impl JwtProvider {
    pub fn new(settings: &JwtSettings) -> anyhow::Result<Self> {
        if settings.secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = settings.leeway_seconds;

        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }

        match &settings.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            resolver: None,
        })
    }

    /// Map token subjects to principals through the host application.
    pub fn with_resolver(mut self, resolver: Arc<dyn UserResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

impl AuthorizationHeader for JwtProvider {
    fn authorization_scheme(&self) -> &str {
        "Bearer"
    }
}

#[async_trait]
impl Provider for JwtProvider {
    async fn authenticate(
        &self,
        request: &AuthRequest,
        _route: &RouteInfo,
    ) -> Result<Principal, ProviderError> {
        let token = self.authorization_credentials(request)?;

        let claims = decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| ProviderError::unauthorized(format!("Invalid token: {}", e)))?
            .claims;

        debug!("JWT verified successfully for subject: {}", claims.sub);

        let Some(resolver) = &self.resolver else {
            let mut principal = Principal::user(claims.sub, "jwt")
                .with_email(claims.email)
                .with_display_name(claims.name);
            if let Some(scope) = claims.scope {
                principal = principal.with_attribute("scope", scope);
            }
            return Ok(principal);
        };

        match resolver.resolve(&claims.sub).await {
            Ok(Some(principal)) => Ok(principal),
            Ok(None) => Err(ProviderError::unauthorized("Unknown token subject")),
            Err(e) => Err(ProviderError::internal(format!("user resolver failed: {}", e))),
        }
    }

    fn challenge(&self) -> Option<&str> {
        Some("Bearer")
    }
}
