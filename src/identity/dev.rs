//! In-process identity provider for local development
//!
//! Mints HS256 tokens carrying the roles from the `[dev]` configuration so the
//! application can run without a reachable identity server.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{DevConfig, IdentityConfig};
use crate::error::{Result, SessionError};
use super::claims::sign_claims;
use super::client::IdentityClient;
use super::types::{unix_to_system_time, IssuedToken, RoleClaim, TokenClaims, UserProfile};

const DEV_SIGNING_SECRET: &[u8] = b"pep-session-dev-only";

#[derive(Default)]
struct DevState {
    token: Option<IssuedToken>,
    last_login_target: Option<String>,
    issuer: Option<String>,
}

/// Identity client that signs the configured dev user in without a server
pub struct DevIdentityClient {
    config: DevConfig,
    state: RwLock<DevState>,
}

impl DevIdentityClient {
    pub fn new(config: DevConfig) -> Self {
        Self {
            config,
            state: RwLock::new(DevState::default()),
        }
    }

    /// Redirect target passed to the most recent `login`
    pub fn last_login_target(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_login_target
            .clone()
    }

    fn username(&self) -> String {
        self.config
            .local_dev_username
            .clone()
            .unwrap_or_else(|| "dev-user".to_string())
    }

    /// Create mock token claims for the dev user
    pub fn create_dev_claims(&self, issued_at: i64) -> TokenClaims {
        let mut extra = HashMap::new();
        extra.insert("jti".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        if let Some(name) = &self.config.local_dev_name {
            extra.insert("name".to_string(), Value::String(name.clone()));
        }

        let issuer = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .issuer
            .clone()
            .unwrap_or_else(|| "dev".to_string());

        TokenClaims {
            sub: Some(self.username()),
            iss: Some(issuer),
            exp: Some(issued_at + self.config.token_lifetime_seconds() as i64),
            iat: Some(issued_at),
            preferred_username: Some(self.username()),
            email: self.config.local_dev_email.clone(),
            realm_access: Some(RoleClaim {
                roles: self.config.local_dev_roles.clone(),
            }),
            resource_access: HashMap::new(),
            extra,
        }
    }

    fn mint(&self) -> Result<IssuedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .map_err(|e| SessionError::Internal(e.into()))?;
        let claims = self.create_dev_claims(now);
        let expires_at = claims
            .exp
            .and_then(unix_to_system_time)
            .ok_or_else(|| SessionError::Token("dev token expiry out of range".to_string()))?;
        let access_token = sign_claims(&claims, DEV_SIGNING_SECRET)?;
        Ok(IssuedToken::new(access_token, expires_at))
    }

    fn install(&self, token: Option<IssuedToken>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).token = token;
    }
}

#[async_trait]
impl IdentityClient for DevIdentityClient {
    async fn init(&self, config: &IdentityConfig) -> Result<bool> {
        config.validate()?;
        self.state.write().unwrap_or_else(PoisonError::into_inner).issuer = Some(config.issuer_url());

        if !self.config.is_enabled() {
            tracing::debug!("Dev identity client initialized without a session");
            return Ok(false);
        }
        let token = self.mint()?;
        self.install(Some(token));
        tracing::info!("Dev identity client signed in as {}", self.username());
        Ok(true)
    }

    async fn login(&self, redirect_target: &str) -> Result<()> {
        let token = self.mint()?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.token = Some(token);
        state.last_login_target = Some(redirect_target.to_string());
        tracing::info!("Dev login for {}, returning to {}", self.username(), redirect_target);
        Ok(())
    }

    async fn logout(&self, _redirect_uri: Option<&str>) -> Result<()> {
        self.install(None);
        Ok(())
    }

    async fn refresh(&self, min_validity_seconds: u64) -> Result<bool> {
        let current = self
            .credential()
            .ok_or_else(|| SessionError::RefreshRejected("no dev session to refresh".to_string()))?;

        if current.seconds_until_expiry(SystemTime::now()) > min_validity_seconds as i64 {
            return Ok(false);
        }
        let token = self.mint()?;
        self.install(Some(token));
        Ok(true)
    }

    async fn load_profile(&self) -> Result<UserProfile> {
        if self.credential().is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        let (first_name, last_name) = match &self.config.local_dev_name {
            Some(name) => match name.split_once(' ') {
                Some((first, last)) => (Some(first.to_string()), Some(last.to_string())),
                None => (Some(name.clone()), None),
            },
            None => (None, None),
        };
        Ok(UserProfile {
            id: Some(self.username()),
            username: Some(self.username()),
            email: self.config.local_dev_email.clone(),
            first_name,
            last_name,
            email_verified: Some(true),
        })
    }

    fn credential(&self) -> Option<IssuedToken> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }
}
