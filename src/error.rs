//! Error types for the authentication layer.
//!
//! Three families live here:
//!
//! - [`ProviderError`]: what a single provider reports for one attempt
//! - [`AuthError`]: what the chain and the request context report to callers
//! - [`ConfigurationError`]: startup / route-compilation failures

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::types::ProviderName;

/// Message surfaced when no provider gave a more specific reason.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Failed to authenticate because of bad credentials or an invalid authorization header.";

/// How a provider declined a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The expected header or credential shape was missing or malformed.
    BadRequest,
    /// A credential was present but did not verify.
    Unauthorized,
}

/// One declined attempt in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAttempt {
    pub provider: ProviderName,
    pub kind: FailureKind,
    pub reason: String,
}

/// Aggregate of every declined attempt, in attempt order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthFailure {
    attempts: Vec<FailedAttempt>,
    challenges: Vec<String>,
}

impl AuthFailure {
    /// Create a failure from recorded attempts.
    pub fn new(attempts: Vec<FailedAttempt>) -> Self {
        Self {
            attempts,
            challenges: Vec::new(),
        }
    }

    /// Record another declined attempt.
    pub fn push(&mut self, provider: ProviderName, kind: FailureKind, reason: impl Into<String>) {
        self.attempts.push(FailedAttempt {
            provider,
            kind,
            reason: reason.into(),
        });
    }

    /// Remember a `WWW-Authenticate` challenge of an attempted provider.
    pub fn add_challenge(&mut self, challenge: impl Into<String>) {
        let challenge = challenge.into();
        if !self.challenges.contains(&challenge) {
            self.challenges.push(challenge);
        }
    }

    /// Challenges of the attempted providers, in attempt order.
    pub fn challenges(&self) -> &[String] {
        &self.challenges
    }

    /// All recorded attempts, in the order the providers were tried.
    pub fn attempts(&self) -> &[FailedAttempt] {
        &self.attempts
    }

    /// Number of recorded attempts.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    /// Return `true` if no provider was attempted.
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Names of the attempted providers, in order.
    pub fn providers(&self) -> impl Iterator<Item = &ProviderName> {
        self.attempts.iter().map(|a| &a.provider)
    }

    /// Primary message for the caller.
    ///
    /// The first credential rejection wins. Header-shape failures only say
    /// that a provider did not apply, so they fall back to the generic text.
    pub fn message(&self) -> &str {
        self.attempts
            .iter()
            .find(|a| a.kind == FailureKind::Unauthorized)
            .map(|a| a.reason.as_str())
            .unwrap_or(GENERIC_FAILURE_MESSAGE)
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a single provider declining or failing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Expected header absent, wrong scheme, or undecodable credential.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Credential present but invalid, or the principal was not found.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The provider itself broke (backing service down, bad state).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// The recoverable kind, or `None` for internal faults.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::BadRequest(_) => Some(FailureKind::BadRequest),
            Self::Unauthorized(_) => Some(FailureKind::Unauthorized),
            Self::Internal(_) => None,
        }
    }

    /// The reason text without the kind prefix.
    pub fn reason(&self) -> &str {
        match self {
            Self::BadRequest(r) | Self::Unauthorized(r) | Self::Internal(r) => r,
        }
    }
}

/// Errors reported by the chain engine and the request context.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Every candidate provider declined.
    #[error("{0}")]
    AuthenticationFailed(AuthFailure),
    /// A provider failed unexpectedly; the chain was aborted.
    #[error("provider `{provider}` failed internally: {message}")]
    ProviderInternal {
        provider: ProviderName,
        message: String,
    },
    /// A registered factory could not build its provider.
    #[error("provider `{provider}` could not be constructed: {message}")]
    ProviderConstruction {
        provider: ProviderName,
        message: String,
    },
    /// A name was requested that was never registered.
    #[error("unknown authentication provider `{0}`")]
    UnknownProvider(ProviderName),
    /// The whole attempt exceeded the configured deadline.
    #[error("authentication timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl AuthError {
    /// The aggregate failure, if this is an authentication failure.
    pub fn failure(&self) -> Option<&AuthFailure> {
        match self {
            Self::AuthenticationFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Configuration problems detected at startup or route compilation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("route `{route}` restricts authentication to unknown provider `{provider}`")]
    UnknownProvider {
        route: String,
        provider: ProviderName,
    },
    #[error("route `{route}` declares an empty provider list")]
    EmptyProviderList { route: String },
    #[error("route `{route}` lists provider `{provider}` more than once")]
    RepeatedProvider {
        route: String,
        provider: ProviderName,
    },
    #[error("provider `{0}` is declared more than once")]
    DuplicateProvider(ProviderName),
    #[error("route `{route}` uses undeclared controller `{controller}`")]
    UnknownController { route: String, controller: String },
    #[error("invalid route `{route}`: {message}")]
    InvalidRoute { route: String, message: String },
    #[error("invalid provider `{provider}`: {message}")]
    InvalidProvider {
        provider: ProviderName,
        message: String,
    },
}
