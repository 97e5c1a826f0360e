//! Identity provider contract and supporting types
//!
//! The session layer never talks HTTP to the identity server itself; it goes
//! through an [`IdentityClient`]. A development implementation that needs no
//! server is available behind the `dev-identity` feature.

pub mod claims;
pub mod client;
pub mod types;

#[cfg(feature = "dev-identity")]
pub mod dev;

pub use claims::decode_claims;
pub use client::IdentityClient;
pub use types::{IssuedToken, RoleClaim, TokenClaims, UserProfile};

#[cfg(feature = "dev-identity")]
pub use dev::DevIdentityClient;
