//! # PEP Session - client-side Policy Enforcement Point
//!
//! A Rust library that keeps an OIDC-backed session for a single-page
//! application, guards navigation by role claims and attaches fresh bearer
//! credentials to outbound API requests.
//!
//! ## Components
//!
//! - [`session::SessionStore`]: the one in-memory session snapshot
//! - [`identity::IdentityClient`]: async contract of the external identity provider
//! - [`session::SessionManager`]: bootstrap, coalesced refresh, profile, logout
//! - [`auth::AccessGuard`]: allow / redirect-to-login / forbidden per navigation
//! - [`auth::RequestAuthenticator`]: bearer injection, also as a tower layer
//!
//! ## Features
//!
//! - `dev-identity`: in-process identity client for local development
//! - `reqwest-client`: `AuthenticatedClient` over `reqwest`

pub mod error;
pub use error::{Result, SessionError};

pub mod auth;
pub mod config;
pub mod identity;
pub mod session;

#[cfg(feature = "reqwest-client")]
pub mod http_client;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types at crate root
pub use crate::auth::{
    AccessDecision, AccessGuard, RequestAuthenticator, RoleSet, RouteAuthRequirement, RouteTable,
};
pub use crate::config::{ClientConfig, DevConfig, IdentityConfig, SessionSettings};
pub use crate::identity::{IdentityClient, IssuedToken, TokenClaims, UserProfile};
pub use crate::session::{SessionManager, SessionStore};

#[cfg(feature = "dev-identity")]
pub use crate::identity::DevIdentityClient;

#[cfg(feature = "reqwest-client")]
pub use crate::http_client::AuthenticatedClient;
