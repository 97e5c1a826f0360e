//! The in-memory session snapshot

use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use crate::auth::roles::RoleSet;
use crate::identity::types::{IssuedToken, UserProfile};

/// Authentication state of the running process
///
/// Token and expiry travel together in one [`IssuedToken`], so they are
/// present or absent as a pair, and their presence is what "authenticated"
/// means. Roles are only ever non-empty alongside a credential.
#[derive(Debug, Default)]
pub struct Session {
    credential: Option<IssuedToken>,
    roles: RoleSet,
    profile: Option<UserProfile>,
}

impl Session {
    pub fn authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.access_token.as_str())
    }

    pub fn token_expiry(&self) -> Option<SystemTime> {
        self.credential.as_ref().map(|c| c.expires_at)
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Seconds until the token expires, `None` when unauthenticated
    pub fn seconds_until_expiry(&self, now: SystemTime) -> Option<i64> {
        self.credential.as_ref().map(|c| c.seconds_until_expiry(now))
    }
}

/// Shared holder of the single [`Session`]
///
/// Anyone holding the store may read; writes are crate-private and issued by
/// the session manager only.
#[derive(Debug, Default)]
pub struct SessionStore {
    session: RwLock<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the current session
    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        f(&session)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(Session::authenticated)
    }

    pub fn roles(&self) -> RoleSet {
        self.read(|s| s.roles.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.read(|s| s.token().map(str::to_string))
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.read(|s| s.profile.clone())
    }

    /// Install a new credential, replacing roles wholesale. The cached
    /// profile survives because the user is the same.
    pub(crate) fn apply_credential(&self, credential: IssuedToken, roles: RoleSet) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        session.credential = Some(credential);
        session.roles = roles;
    }

    /// Cache a profile; ignored when the session is no longer authenticated
    pub(crate) fn set_profile(&self, profile: UserProfile) -> bool {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        if session.credential.is_none() {
            return false;
        }
        session.profile = Some(profile);
        true
    }

    /// Back to the initial, unauthenticated state
    pub(crate) fn reset(&self) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *session = Session::default();
    }
}
