//! HS256 bearer tokens.
//!
//! A token carries the principal id as `sub` and an absolute expiry as
//! `exp`. Verification yields the principal id or an auth error; there is
//! no session state on the server side.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use parley_core::error::AuthError;
use parley_core::user::UserId;
use serde::{Deserialize, Serialize};

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal (user) id
    pub sub: String,
    /// Expiry, seconds since epoch
    pub exp: i64,
}

/// Issues and verifies bearer tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expire_minutes: i64,
}

impl TokenService {
    pub fn new(secret: &str, expire_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expire_minutes,
        }
    }

    /// Issue an access token for a user with the configured expiry.
    pub fn issue(&self, user_id: &UserId) -> Result<String, AuthError> {
        self.issue_with_expiry(user_id, Duration::minutes(self.expire_minutes))
    }

    /// Issue a refresh token (7 day expiry).
    pub fn issue_refresh(&self, user_id: &UserId) -> Result<String, AuthError> {
        self.issue_with_expiry(user_id, Duration::days(7))
    }

    fn issue_with_expiry(&self, user_id: &UserId, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.0.clone(),
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "Token signing failed");
            AuthError::InvalidToken
        })
    }

    /// Verify a token and extract the principal id.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;
        Ok(UserId(data.claims.sub))
    }

    /// Whether a token is past its expiry. Bad signatures count as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        let mut validation = Validation::default();
        validation.validate_exp = false;
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims.exp < Utc::now().timestamp(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 60)
    }

    #[test]
    fn issue_then_verify_round_trips() {
        let svc = service();
        let user = UserId::from("u-42");
        let token = svc.issue(&user).unwrap();
        assert_eq!(svc.verify(&token).unwrap(), user);
        assert!(!svc.is_expired(&token));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = service().issue(&UserId::from("u-1")).unwrap();
        let other = TokenService::new("other-secret", 60);
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let token = svc
            .issue_with_expiry(&UserId::from("u-1"), Duration::minutes(-5))
            .unwrap();
        assert!(matches!(svc.verify(&token), Err(AuthError::TokenExpired)));
        assert!(svc.is_expired(&token));
    }

    #[test]
    fn garbage_counts_as_expired() {
        assert!(service().is_expired("not-a-token"));
    }

    #[test]
    fn refresh_token_outlives_access_token() {
        let svc = service();
        let token = svc.issue_refresh(&UserId::from("u-1")).unwrap();
        assert_eq!(svc.verify(&token).unwrap(), UserId::from("u-1"));
    }
}
