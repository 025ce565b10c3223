//! Token acquisition for outbound agent loop calls.
//!
//! - [`CredentialProvider`]: capability to mint a bearer token for scopes.
//! - [`ManagedIdentityCredential`]: the platform identity endpoint backend.
//! - [`TimeoutCredential`]: bounds each acquisition.
//! - [`TokenResolver`]: picks the token for an inbound message, with one
//!   fallback audience.
//!
//! Tokens are not cached; every message re-acquires.

pub mod credential;
pub mod managed_identity;
pub mod resolver;

pub use credential::{CredentialProvider, Scopes, TimeoutCredential, TokenRequest};
pub use managed_identity::{IdentityEndpoint, ManagedIdentityCredential};
pub use resolver::{ResolvedToken, TokenResolver, TokenSource};
