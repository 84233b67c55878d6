//! Authentication negotiation.
//!
//! This module decides, per request, whether the caller is authenticated and
//! as whom, without knowing how any credential scheme works:
//!
//! - **Chain**: [`Authenticator`] tries providers in order, first success wins
//! - **Context**: [`AuthContext`] runs the chain lazily, at most once per request
//! - **Principal**: the identity a provider hands back
//!
//! ## Request Lifecycle
//!
//! - The route table yields the effective policy for the matched route
//! - An empty `AuthContext` is attached to the request
//! - The first `user()` call runs the chain against the allowed providers
//! - Protected routes reject before the handler when nobody authenticated
//! - Optional routes continue with no principal
//!
//! ## Usage
//!
//! ```ignore
//! let ctx = AuthContext::new(authenticator, policy, request, route);
//!
//! match ctx.user().await? {
//!     Some(user) => println!("hello {}", user.display()),
//!     None => println!("hello stranger"),
//! }
//! ```

mod chain;
mod context;
mod principal;


pub use chain::{Authenticated, Authenticator};
pub use context::{AuthContext, AuthOutcome, AuthState};
pub use principal::{Principal, PrincipalKind};
