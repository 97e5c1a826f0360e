//! Common types exchanged with the identity provider

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// An access token together with the instant it stops being valid
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Opaque bearer credential
    pub access_token: String,
    /// Expiry instant
    pub expires_at: SystemTime,
}

impl IssuedToken {
    pub fn new(access_token: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Build from a JWT, taking the expiry from its `exp` claim
    pub fn from_jwt(access_token: impl Into<String>) -> crate::Result<Self> {
        let access_token = access_token.into();
        let claims = super::claims::decode_claims(&access_token)?;
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| crate::SessionError::Token("token has no exp claim".to_string()))?;
        Ok(Self { access_token, expires_at })
    }

    /// Signed number of whole seconds until expiry; negative once expired
    pub fn seconds_until_expiry(&self, now: SystemTime) -> i64 {
        seconds_between(now, self.expires_at)
    }
}

// Keep tokens out of debug output.
impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub(crate) fn seconds_between(from: SystemTime, to: SystemTime) -> i64 {
    match to.duration_since(from) {
        Ok(ahead) => ahead.as_secs() as i64,
        Err(behind) => -(behind.duration().as_secs() as i64),
    }
}

pub(crate) fn unix_to_system_time(secs: i64) -> Option<SystemTime> {
    u64::try_from(secs)
        .ok()
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
}

/// Role list as carried in `realm_access` / `resource_access` claims
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims carried by an access token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Expiration time (seconds since the epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued at time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Preferred username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Realm-level roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RoleClaim>,
    /// Client-level roles keyed by client id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub resource_access: HashMap<String, RoleClaim>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.exp.and_then(unix_to_system_time)
    }
}

/// User profile record as returned by the identity provider's account endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
}
