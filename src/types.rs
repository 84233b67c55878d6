//! NewType wrappers for strong typing throughout the auth layer.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a principal ID where a provider name is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Unique name of a registered authentication provider.
    ///
    /// Common values: "basic", "jwt", "api_key". Routes restrict the chain
    /// by listing these names, so they are also the keys of the registry.
    ProviderName
);

newtype_string!(
    /// Stable identifier of an authenticated principal.
    ///
    /// For users this is usually the username or a JWT `sub` claim; for
    /// clients it is derived from the API key digest.
    PrincipalId
);

newtype_string!(
    /// SHA-256 hash of an API key or password, hex encoded.
    ///
    /// Secrets are never kept in plain text. Configuration stores the digest
    /// and incoming credentials are hashed before comparison.
    SecretHash
);

newtype_string!(
    /// Display prefix of an API key (e.g., "uak_abc12345").
    ///
    /// The prefix can be safely shown to operators for identification. It
    /// does not reveal the full key and cannot be used for authentication.
    ApiKeyPrefix
);
