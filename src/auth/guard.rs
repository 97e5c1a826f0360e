//! Navigation guard
//!
//! Answers whether a navigation attempt may enter a view, using only the
//! in-memory session snapshot. It never refreshes tokens: roles are
//! re-validated by the backend on every protected request, and keeping them
//! fresh is the request pipeline's concern.

use std::sync::Arc;

use super::roles::RoleSet;
use super::routes::{RouteAuthRequirement, RouteTable};

/// Read access to the current session
pub trait SessionReader: Send + Sync {
    fn is_authenticated(&self) -> bool;
    fn current_roles(&self) -> RoleSet;
}

/// Ability to hand control to the identity provider's login page
pub trait LoginTrigger: Send + Sync {
    /// Start login exactly once; the caller must treat the current
    /// navigation as over. Implementations may return before the login has
    /// finished.
    fn begin_login(&self, return_target: &str);
}

/// Outcome of a single navigation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Navigation may proceed
    Allow,
    /// No session; login has been started and navigation is abandoned
    DenyRedirectToLogin,
    /// Authenticated but missing the listed roles
    DenyForbidden { missing: RoleSet },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    /// HTTP status equivalent, for layers that report decisions that way
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            AccessDecision::Allow => http::StatusCode::OK,
            AccessDecision::DenyRedirectToLogin => http::StatusCode::UNAUTHORIZED,
            AccessDecision::DenyForbidden { .. } => http::StatusCode::FORBIDDEN,
        }
    }
}

/// Route guard over any session that can be read and can start a login
pub struct AccessGuard<S> {
    session: Arc<S>,
}

impl<S> Clone for AccessGuard<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<S: SessionReader + LoginTrigger> AccessGuard<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }

    /// Decide whether navigation to `attempted_url` may proceed
    pub fn decide(&self, requirement: &RouteAuthRequirement, attempted_url: &str) -> AccessDecision {
        if !self.session.is_authenticated() {
            tracing::debug!("Navigation to {} requires login", attempted_url);
            self.session.begin_login(attempted_url);
            return AccessDecision::DenyRedirectToLogin;
        }

        if requirement.required_roles.is_empty() {
            return AccessDecision::Allow;
        }

        let granted = self.session.current_roles();
        if requirement.required_roles.is_subset_of(&granted) {
            AccessDecision::Allow
        } else {
            let missing = requirement.required_roles.missing_from(&granted);
            tracing::warn!(
                "Access denied to {}: missing roles [{}] (required [{}], granted [{}])",
                attempted_url,
                missing,
                requirement.required_roles,
                granted
            );
            AccessDecision::DenyForbidden { missing }
        }
    }

    /// Look the URL up in `routes` and decide
    pub fn decide_url(&self, routes: &RouteTable, attempted_url: &str) -> AccessDecision {
        let requirement = routes.requirement_for(attempted_url);
        self.decide(&requirement, attempted_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use crate::testing::{eventually, identity_config, InitScript, ScriptedIdentityClient};
    use crate::config::SessionSettings;
    use std::sync::Mutex;

    struct FakeSession {
        authenticated: bool,
        roles: RoleSet,
        logins: Mutex<Vec<String>>,
    }

    impl FakeSession {
        fn new(authenticated: bool, roles: impl Into<RoleSet>) -> Arc<Self> {
            Arc::new(Self {
                authenticated,
                roles: roles.into(),
                logins: Mutex::new(Vec::new()),
            })
        }

        fn login_count(&self) -> usize {
            self.logins.lock().unwrap().len()
        }
    }

    impl SessionReader for FakeSession {
        fn is_authenticated(&self) -> bool {
            self.authenticated
        }

        fn current_roles(&self) -> RoleSet {
            self.roles.clone()
        }
    }

    impl LoginTrigger for FakeSession {
        fn begin_login(&self, return_target: &str) {
            self.logins.lock().unwrap().push(return_target.to_string());
        }
    }

    #[test]
    fn test_missing_one_of_required_roles_is_forbidden() {
        let session = FakeSession::new(true, ["admin"]);
        let guard = AccessGuard::new(session.clone());

        let decision = guard.decide(&RouteAuthRequirement::new(["admin", "user"]), "/users");
        assert_eq!(
            decision,
            AccessDecision::DenyForbidden { missing: RoleSet::from(["user"]) }
        );
        assert_eq!(session.login_count(), 0);
    }

    #[test]
    fn test_superset_of_roles_is_allowed() {
        let guard = AccessGuard::new(FakeSession::new(true, ["admin", "user"]));
        let decision = guard.decide(&RouteAuthRequirement::new(["user"]), "/users");
        assert_eq!(decision, AccessDecision::Allow);
    }

    #[test]
    fn test_unauthenticated_without_requirement_still_needs_login() {
        let session = FakeSession::new(false, RoleSet::new());
        let guard = AccessGuard::new(session.clone());

        let decision = guard.decide(&RouteAuthRequirement::authenticated(), "/users");
        assert_eq!(decision, AccessDecision::DenyRedirectToLogin);
        assert_eq!(session.login_count(), 1);
        assert_eq!(session.logins.lock().unwrap()[0], "/users");
    }

    #[test]
    fn test_unauthenticated_always_redirects_once_per_attempt() {
        let requirements = [
            RouteAuthRequirement::authenticated(),
            RouteAuthRequirement::new(["admin"]),
            RouteAuthRequirement::new(["admin", "user", "operator"]),
        ];
        for requirement in &requirements {
            let session = FakeSession::new(false, RoleSet::new());
            let guard = AccessGuard::new(session.clone());
            assert_eq!(guard.decide(requirement, "/x"), AccessDecision::DenyRedirectToLogin);
            assert_eq!(session.login_count(), 1);
        }
    }

    #[test]
    fn test_allow_iff_required_subset_of_granted() {
        let universe = ["admin", "user", "operator"];
        // Every pair of subsets of the universe, encoded as bitmasks.
        for granted_mask in 0u8..8 {
            for required_mask in 0u8..8 {
                let pick = |mask: u8| -> RoleSet {
                    universe
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, r)| *r)
                        .collect()
                };
                let granted = pick(granted_mask);
                let required = pick(required_mask);
                let guard = AccessGuard::new(FakeSession::new(true, granted.clone()));

                let decision = guard.decide(&RouteAuthRequirement::new(required.clone()), "/x");
                assert_eq!(
                    decision.is_allowed(),
                    required_mask & !granted_mask == 0,
                    "required={} granted={}",
                    required,
                    granted
                );
            }
        }
    }

    #[test]
    fn test_decide_url_uses_route_table() {
        let routes = RouteTable::new()
            .with_route("profiles", RouteAuthRequirement::new(["admin"]))
            .with_route("call-records/**", RouteAuthRequirement::new(["operator"]));
        let guard = AccessGuard::new(FakeSession::new(true, ["operator"]));

        assert_eq!(
            guard.decide_url(&routes, "/profiles"),
            AccessDecision::DenyForbidden { missing: RoleSet::from(["admin"]) }
        );
        assert!(guard.decide_url(&routes, "/call-records/edit/4").is_allowed());
        assert!(guard.decide_url(&routes, "/unlisted").is_allowed());
    }

    #[test]
    fn test_decision_status_codes() {
        assert_eq!(AccessDecision::Allow.status_code(), http::StatusCode::OK);
        assert_eq!(
            AccessDecision::DenyRedirectToLogin.status_code(),
            http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AccessDecision::DenyForbidden { missing: RoleSet::new() }.status_code(),
            http::StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_guard_over_session_manager_starts_exactly_one_login() {
        let client = Arc::new(ScriptedIdentityClient::new(InitScript::Anonymous));
        let manager = SessionManager::new(client.clone(), identity_config(), SessionSettings::default());
        manager.bootstrap().await.unwrap();

        let guard = AccessGuard::new(Arc::new(manager));
        let decision = guard.decide(&RouteAuthRequirement::new(["admin"]), "http://app.local/profiles");
        assert_eq!(decision, AccessDecision::DenyRedirectToLogin);

        eventually(|| ScriptedIdentityClient::count(&client.login_calls) == 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(ScriptedIdentityClient::count(&client.login_calls), 1);
        assert_eq!(
            client.login_targets.lock().unwrap().as_slice(),
            ["http://app.local/profiles".to_string()]
        );
    }

    #[test]
    fn test_guard_without_runtime_still_starts_login() {
        let client = Arc::new(ScriptedIdentityClient::new(InitScript::Anonymous));
        let manager = SessionManager::new(client.clone(), identity_config(), SessionSettings::default());

        let guard = AccessGuard::new(Arc::new(manager));
        assert_eq!(
            guard.decide(&RouteAuthRequirement::authenticated(), "/users"),
            AccessDecision::DenyRedirectToLogin
        );
        assert_eq!(ScriptedIdentityClient::count(&client.login_calls), 1);
    }

    #[tokio::test]
    async fn test_guard_over_session_manager_checks_roles() {
        let client = Arc::new(ScriptedIdentityClient::authenticated(vec!["admin", "user"], 3600));
        let manager = SessionManager::new(client.clone(), identity_config(), SessionSettings::default());
        assert!(manager.bootstrap().await.unwrap());

        let guard = AccessGuard::new(Arc::new(manager));
        assert!(guard.decide(&RouteAuthRequirement::new(["user"]), "/users").is_allowed());
        assert_eq!(
            guard.decide(&RouteAuthRequirement::new(["operator"]), "/call-records"),
            AccessDecision::DenyForbidden { missing: RoleSet::from(["operator"]) }
        );
        assert_eq!(ScriptedIdentityClient::count(&client.login_calls), 0);
        assert_eq!(ScriptedIdentityClient::count(&client.refresh_calls), 0);
    }
}
