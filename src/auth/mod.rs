//! Navigation guarding and outbound request authentication
//!
//! This module provides the two consumers of the session:
//!
//! - `AccessGuard`: decides whether a navigation may enter a view, given the
//!   route's required roles (all of them must be granted)
//! - `RequestAuthenticator`: attaches a fresh bearer credential to outbound
//!   requests, usable directly or as a tower layer
//!
//! # Example
//!
//! ```ignore
//! use pep_session::auth::{AccessGuard, RequestAuthenticator};
//! use tower::ServiceBuilder;
//!
//! let guard = AccessGuard::new(manager.clone());
//! if !guard.decide_url(&routes, "/users/add").is_allowed() {
//!     return;
//! }
//!
//! let transport = ServiceBuilder::new()
//!     .layer(RequestAuthenticator::from_config(manager, &config).layer())
//!     .service(http_transport);
//! ```

pub mod guard;
pub mod middleware;
pub mod roles;
pub mod routes;

pub use guard::{AccessDecision, AccessGuard, LoginTrigger, SessionReader};
pub use middleware::{Attachment, AuthenticateLayer, AuthenticateService, CredentialSource, RequestAuthenticator};
pub use roles::RoleSet;
pub use routes::{RouteAuthRequirement, RouteTable};
