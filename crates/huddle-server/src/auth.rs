//! Credential verification for chat connections.
//!
//! The token arrives in the `token` query parameter. Every failure mode
//! (missing, malformed, expired, wrong type, unknown user, directory down)
//! collapses to [`Identity::Anonymous`]; the verifier never errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use huddle_core::{Identity, UserDirectory, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The only `token_type` accepted when the claim is present.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Resolves a bearer token to an identity.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Resolve `token`; `None` means the parameter was absent.
    async fn verify(&self, token: Option<&str>) -> Identity;
}

/// JWT claims carried by chat tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id.
    pub user_id: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Issued-at (seconds since epoch).
    #[serde(default)]
    pub iat: i64,
    /// Token kind; refresh tokens must not open chat connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// HS256 verifier backed by a [`UserDirectory`].
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    directory: Arc<dyn UserDirectory>,
}

impl JwtVerifier {
    /// Build a verifier for tokens signed with `secret`.
    pub fn new(secret: &str, leeway_secs: u64, directory: Arc<dyn UserDirectory>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            directory,
        }
    }

    fn decode_claims(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(error = %e, "token rejected");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, token: Option<&str>) -> Identity {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Identity::Anonymous;
        };
        let Some(claims) = self.decode_claims(token) else {
            return Identity::Anonymous;
        };
        if claims
            .token_type
            .as_deref()
            .is_some_and(|kind| kind != ACCESS_TOKEN_TYPE)
        {
            debug!(user_id = claims.user_id, "non-access token rejected");
            return Identity::Anonymous;
        }

        let user_id = UserId(claims.user_id);
        match self.directory.find_user(user_id).await {
            Ok(Some(user)) => Identity::Authenticated(user),
            Ok(None) => {
                debug!(%user_id, "token references unknown user");
                Identity::Anonymous
            }
            Err(e) => {
                warn!(%user_id, error = %e, "user lookup failed during verification");
                Identity::Anonymous
            }
        }
    }
}

/// Sign an access token for `user_id`, valid for `ttl`.
pub fn issue_token(
    secret: &str,
    user_id: UserId,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        user_id: user_id.get(),
        exp: now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX - now),
        iat: now,
        token_type: Some(ACCESS_TOKEN_TYPE.into()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{StoreError, User};

    const SECRET: &str = "test-secret";

    struct FixedDirectory(Result<Option<User>, StoreError>);

    #[async_trait]
    impl UserDirectory for FixedDirectory {
        async fn find_user(&self, _user_id: UserId) -> Result<Option<User>, StoreError> {
            self.0.clone()
        }
    }

    fn alice() -> User {
        User {
            id: UserId(1),
            username: "A".into(),
        }
    }

    fn verifier(found: Result<Option<User>, StoreError>) -> JwtVerifier {
        JwtVerifier::new(SECRET, 0, Arc::new(FixedDirectory(found)))
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(token_type: Option<&str>, exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            user_id: 1,
            exp: now + exp_offset,
            iat: now,
            token_type: token_type.map(Into::into),
        }
    }

    #[tokio::test]
    async fn valid_token_resolves_user() {
        let token = issue_token(SECRET, UserId(1), Duration::from_secs(60)).unwrap();
        let identity = verifier(Ok(Some(alice()))).verify(Some(&token)).await;
        assert_eq!(identity, Identity::Authenticated(alice()));
    }

    #[tokio::test]
    async fn token_without_type_is_accepted() {
        let token = sign(&claims(None, 60), SECRET);
        let identity = verifier(Ok(Some(alice()))).verify(Some(&token)).await;
        assert!(!identity.is_anonymous());
    }

    #[tokio::test]
    async fn missing_or_blank_token_is_anonymous() {
        let v = verifier(Ok(Some(alice())));
        assert!(v.verify(None).await.is_anonymous());
        assert!(v.verify(Some("")).await.is_anonymous());
        assert!(v.verify(Some("   ")).await.is_anonymous());
    }

    #[tokio::test]
    async fn garbage_token_is_anonymous() {
        let v = verifier(Ok(Some(alice())));
        assert!(v.verify(Some("not-a-jwt")).await.is_anonymous());
    }

    #[tokio::test]
    async fn wrong_signature_is_anonymous() {
        let token = sign(&claims(Some("access"), 60), "other-secret");
        assert!(verifier(Ok(Some(alice()))).verify(Some(&token)).await.is_anonymous());
    }

    #[tokio::test]
    async fn expired_token_is_anonymous() {
        let token = sign(&claims(Some("access"), -120), SECRET);
        assert!(verifier(Ok(Some(alice()))).verify(Some(&token)).await.is_anonymous());
    }

    #[tokio::test]
    async fn refresh_token_is_anonymous() {
        let token = sign(&claims(Some("refresh"), 60), SECRET);
        assert!(verifier(Ok(Some(alice()))).verify(Some(&token)).await.is_anonymous());
    }

    #[tokio::test]
    async fn unknown_user_is_anonymous() {
        let token = issue_token(SECRET, UserId(1), Duration::from_secs(60)).unwrap();
        assert!(verifier(Ok(None)).verify(Some(&token)).await.is_anonymous());
    }

    #[tokio::test]
    async fn directory_failure_is_anonymous() {
        let token = issue_token(SECRET, UserId(1), Duration::from_secs(60)).unwrap();
        let v = verifier(Err(StoreError::Unavailable("down".into())));
        assert!(v.verify(Some(&token)).await.is_anonymous());
    }

    #[test]
    fn issued_claims_carry_access_type() {
        let token = issue_token(SECRET, UserId(7), Duration::from_secs(300)).unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        let data =
            decode::<Claims>(&token, &DecodingKey::from_secret(SECRET.as_bytes()), &validation)
                .unwrap();
        assert_eq!(data.claims.user_id, 7);
        assert_eq!(data.claims.token_type.as_deref(), Some(ACCESS_TOKEN_TYPE));
        assert!(data.claims.exp > data.claims.iat);
    }
}
