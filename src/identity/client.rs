//! The identity provider contract consumed by the session layer

use async_trait::async_trait;

use crate::config::IdentityConfig;
use crate::error::{Result, SessionError};
use super::claims::decode_claims;
use super::types::{IssuedToken, TokenClaims, UserProfile};

/// Minimum validity requested by the default [`IdentityClient::get_token`]
const GET_TOKEN_MIN_VALIDITY_SECONDS: u64 = 5;

/// Uniform async wrapper over an external identity provider
///
/// This is the only seam through which the session layer talks to the outside
/// world. Implementations own whatever they persist (refresh tokens, cookies).
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Initialize the client, silently restoring a prior session if one exists.
    /// Returns whether the user is now authenticated. Must return
    /// [`SessionError::Config`] only when the configuration is unusable.
    async fn init(&self, config: &IdentityConfig) -> Result<bool>;

    /// Hand control to the identity provider's login page. In a browser this
    /// normally never resolves because the page navigates away.
    async fn login(&self, redirect_target: &str) -> Result<()>;

    /// End the session at the identity provider
    async fn logout(&self, redirect_uri: Option<&str>) -> Result<()>;

    /// Refresh the access token if it expires within `min_validity_seconds`.
    /// `Ok(false)` means the token was still valid and nothing was done.
    async fn refresh(&self, min_validity_seconds: u64) -> Result<bool>;

    /// Fetch the user's profile
    async fn load_profile(&self) -> Result<UserProfile>;

    /// Current access token and its expiry, without I/O
    fn credential(&self) -> Option<IssuedToken>;

    /// Claims of the current access token
    fn get_claims(&self) -> Option<TokenClaims> {
        let credential = self.credential()?;
        match decode_claims(&credential.access_token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::warn!("Unable to read claims from access token: {}", e);
                None
            }
        }
    }

    /// Current token after any needed refresh
    async fn get_token(&self) -> Result<String> {
        self.refresh(GET_TOKEN_MIN_VALIDITY_SECONDS).await?;
        self.credential()
            .map(|credential| credential.access_token)
            .ok_or(SessionError::NotAuthenticated)
    }
}
