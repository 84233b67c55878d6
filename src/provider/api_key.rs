//! Static API key provider.

use async_trait::async_trait;
use http::HeaderName;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{AuthRequest, Provider, RouteInfo};
use crate::auth::Principal;
use crate::error::ProviderError;
use crate::types::{ApiKeyPrefix, SecretHash};

/// Header name used when none is configured.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Authenticates machine clients by a shared key in a dedicated header.
///
/// Only the SHA-256 digest of the expected key is held.
#[derive(Debug, Clone)]
pub struct ApiKeyProvider {
    header: HeaderName,
    key_hash: SecretHash,
    display_name: String,
}

impl ApiKeyProvider {
    /// Create a provider expecting a key with the given digest.
    pub fn new(key_hash: SecretHash) -> Self {
        Self {
            header: HeaderName::from_static("x-api-key"),
            key_hash,
            display_name: "API Client".to_string(),
        }
    }

    /// Create a provider from the plain key.
    pub fn from_key(key: &str) -> Self {
        Self::new(hash_api_key(key))
    }

    /// Read the key from a different header.
    pub fn with_header(mut self, header: &str) -> anyhow::Result<Self> {
        self.header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid API key header `{}`: {}", header, e))?;
        Ok(self)
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

#[async_trait]
impl Provider for ApiKeyProvider {
    async fn authenticate(
        &self,
        request: &AuthRequest,
        _route: &RouteInfo,
    ) -> Result<Principal, ProviderError> {
        let key = request
            .header(&self.header)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::bad_request(format!("missing {} header", self.header)))?;

        let key_hash = hash_api_key(key);
        if key_hash != self.key_hash {
            return Err(ProviderError::unauthorized("Invalid API key"));
        }

        debug!("API key verified");

        // The digest prefix is stable per key and safe to expose.
        let short = &key_hash.as_str()[..12];
        Ok(Principal::client(format!("api_key:{}", short), "api_key")
            .with_display_name(Some(self.display_name.clone())))
    }
}

/// Hash an API key or password for storage and lookup (don't store raw secrets).
pub fn hash_api_key(key: &str) -> SecretHash {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let result = hasher.finalize();
    SecretHash::new(format!("{:x}", result))
}

/// Generate a new API key with the format: prefix_randompart
/// Returns (full_key, prefix, hash)
pub fn generate_api_key() -> (String, ApiKeyPrefix, SecretHash) {
    use uuid::Uuid;

    let prefix = ApiKeyPrefix::new(format!("uak_{}", &Uuid::new_v4().simple().to_string()[..8]));
    let secret = Uuid::new_v4().simple().to_string();
    let full_key = format!("{}_{}", prefix, secret);
    let key_hash = hash_api_key(&full_key);

    (full_key, prefix, key_hash)
}
