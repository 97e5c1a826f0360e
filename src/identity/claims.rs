use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::Value;

use crate::auth::roles::RoleSet;
use crate::error::{Result, SessionError};
use super::types::TokenClaims;

/// Decode the claims of an access token without verifying its signature
///
/// The token was handed to us by the identity provider and is verified by the
/// backend on every request; here the claims only drive local UI decisions.
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| SessionError::Token(format!("Failed to decode token claims: {}", e)))
}

impl TokenClaims {
    /// All roles granted by the token: realm roles, every client's roles and
    /// a flat `roles` array when the provider emits one
    pub fn roles(&self) -> RoleSet {
        let mut roles = RoleSet::new();
        if let Some(realm) = &self.realm_access {
            roles.extend(realm.roles.iter().cloned());
        }
        for client in self.resource_access.values() {
            roles.extend(client.roles.iter().cloned());
        }
        roles.extend(self.flat_roles());
        roles
    }

    /// Roles from a top-level `roles` claim (empty if not present or invalid type)
    fn flat_roles(&self) -> Vec<String> {
        if let Some(Value::Array(roles)) = self.extra.get("roles") {
            roles
                .iter()
                .filter_map(|r| {
                    if let Value::String(s) = r {
                        Some(s.clone())
                    } else {
                        None
                    }
                })
                .collect()
        } else {
            Vec::new()
        }
    }
}

#[cfg(any(test, feature = "dev-identity"))]
pub(crate) fn sign_claims(claims: &TokenClaims, secret: &[u8]) -> Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    encode(&Header::default(), claims, &EncodingKey::from_secret(secret))
        .map_err(|e| SessionError::Token(format!("Failed to sign token: {}", e)))
}
