//! Authentication providers.
//!
//! Each provider implements one credential scheme behind the [`Provider`]
//! trait and is plugged into the chain through the [`ProviderRegistry`].
//! The negotiation layer never depends on a concrete scheme.
//!
//! Built-in schemes:
//!
//! - **basic**: HTTP Basic against configured users
//! - **jwt**: HS256 Bearer tokens, optionally mapped through a [`UserResolver`]
//! - **api_key**: static key in a dedicated header, yields a client principal

mod api_key;
mod basic;
mod jwt;
mod recipe;
mod registry;
mod resolver;

pub use api_key::{ApiKeyProvider, DEFAULT_API_KEY_HEADER, generate_api_key, hash_api_key};
pub use basic::{BasicProvider, BasicUser};
pub use jwt::{JwtClaims, JwtProvider, JwtSettings};
pub use recipe::{ProviderConfig, ProviderRecipe, build_registry};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use resolver::{StaticUserDirectory, UserResolver};

use std::fmt;

use async_trait::async_trait;
use http::header::{AUTHORIZATION, AsHeaderName};
use http::{HeaderMap, Method, Uri};

use crate::auth::Principal;
use crate::error::ProviderError;

/// Owned snapshot of the inbound request seen by providers.
///
/// Authentication is lazy and may run after the body has been handed to the
/// handler, so only the parts providers need are kept.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl AuthRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// Snapshot the parts of an HTTP request.
    pub fn from_parts(parts: &http::request::Parts) -> Self {
        Self::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value as a string, ignoring non-visible-ASCII values.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The matched route a request is being authenticated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    method: Method,
    path: String,
}

impl RouteInfo {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The route's path pattern (e.g., `/api/v1/posts/{id}`).
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RouteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A pluggable authentication scheme.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Authenticate the request or explain why not.
    ///
    /// Return `BadRequest` when the credential this scheme expects is not
    /// there, `Unauthorized` when it is there but wrong, and `Internal` only
    /// for faults that are not about the credential.
    async fn authenticate(
        &self,
        request: &AuthRequest,
        route: &RouteInfo,
    ) -> Result<Principal, ProviderError>;

    /// Scheme advertised in `WWW-Authenticate` when the chain fails.
    fn challenge(&self) -> Option<&str> {
        None
    }
}

/// Extended capability for schemes carried in the `Authorization` header.
pub trait AuthorizationHeader {
    /// Scheme token, e.g. `Basic` or `Bearer`.
    fn authorization_scheme(&self) -> &str;

    /// Validate the header and return the credential after the scheme.
    ///
    /// The scheme comparison is case-insensitive.
    fn authorization_credentials<'a>(
        &self,
        request: &'a AuthRequest,
    ) -> Result<&'a str, ProviderError> {
        let scheme = self.authorization_scheme();
        let header = request
            .header(AUTHORIZATION)
            .ok_or_else(|| ProviderError::bad_request("missing authorization header"))?;

        let (given, rest) = header.split_once(' ').unwrap_or((header, ""));
        if !given.eq_ignore_ascii_case(scheme) {
            return Err(ProviderError::bad_request(format!(
                "authorization header does not use the {} scheme",
                scheme
            )));
        }

        let credentials = rest.trim();
        if credentials.is_empty() {
            return Err(ProviderError::bad_request(format!(
                "empty {} credentials",
                scheme
            )));
        }
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    struct Bearer;

    impl AuthorizationHeader for Bearer {
        fn authorization_scheme(&self) -> &str {
            "Bearer"
        }
    }

    fn request_with(auth: Option<&str>) -> AuthRequest {
        let mut headers = HeaderMap::new();
        if let Some(value) = auth {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        AuthRequest::new(Method::GET, Uri::from_static("/api/v1/me"), headers)
    }

    #[test]
    fn test_credentials_extracted() {
        let req = request_with(Some("Bearer abc.def.ghi"));
        assert_eq!(Bearer.authorization_credentials(&req).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let req = request_with(Some("bearer token"));
        assert_eq!(Bearer.authorization_credentials(&req).unwrap(), "token");
    }

    #[test]
    fn test_missing_header_is_bad_request() {
        let req = request_with(None);
        let err = Bearer.authorization_credentials(&req).unwrap_err();
        assert!(matches!(err, ProviderError::BadRequest(_)));
    }

    #[test]
    fn test_wrong_scheme_is_bad_request() {
        let req = request_with(Some("Basic dXNlcjpwYXNz"));
        let err = Bearer.authorization_credentials(&req).unwrap_err();
        assert!(matches!(err, ProviderError::BadRequest(_)));
    }

    #[test]
    fn test_empty_credentials_is_bad_request() {
        let req = request_with(Some("Bearer   "));
        let err = Bearer.authorization_credentials(&req).unwrap_err();
        assert_eq!(err, ProviderError::bad_request("empty Bearer credentials"));
    }

    #[test]
    fn test_route_info_display() {
        let route = RouteInfo::new(Method::POST, "/api/v1/posts");
        assert_eq!(route.to_string(), "POST /api/v1/posts");
    }
}
