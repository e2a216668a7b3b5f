//! HS256 JWT implementation of [`TokenVerifier`].
//!
//! Tokens are issued by the login handler, which shares the signing secret with the hub.
//! The hub only verifies them.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use serde::{Deserialize, Serialize};

use super::{AuthenticatedUser, TokenVerifier};
use crate::error::{AuthErrorKind, Error};

const BEARER_PREFIX: &str = "Bearer ";

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id, as a decimal string.
    pub sub: String,
    /// Display name shown to other users.
    pub name: String,
    pub exp: usize,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, Error> {
        let token = token.strip_prefix(BEARER_PREFIX).unwrap_or(token);

        let claims = decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| {
                debug!("Rejected session token: {e}");
                Error::from(e)
            })?
            .claims;

        let user_id = claims.sub.parse().map_err(|_| {
            warn!("Session token subject is not a user id: {}", claims.sub);
            Error::auth(AuthErrorKind::InvalidToken)
        })?;

        Ok(AuthenticatedUser {
            user_id,
            display_name: claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HubErrorKind;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, exp_offset_secs: i64, secret: &str) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as usize;
        let claims = SessionClaims {
            sub: sub.to_string(),
            name: "alice".to_string(),
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_resolves_user() {
        let verifier = JwtVerifier::new(SECRET);
        let user = verifier.verify(&token("17", 3600, SECRET)).await.unwrap();
        assert_eq!(
            user,
            AuthenticatedUser {
                user_id: 17,
                display_name: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bearer_prefix_is_stripped() {
        let verifier = JwtVerifier::new(SECRET);
        let bearer = format!("Bearer {}", token("17", 3600, SECRET));
        assert_eq!(verifier.verify(&bearer).await.unwrap().user_id, 17);
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let err = verifier
            .verify(&token("17", -3600, SECRET))
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, HubErrorKind::Auth(AuthErrorKind::InvalidToken));
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        assert!(verifier
            .verify(&token("17", 3600, "other-secret"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_non_numeric_subject_is_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let err = verifier
            .verify(&token("alice", 3600, SECRET))
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, HubErrorKind::Auth(AuthErrorKind::InvalidToken));
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        assert!(verifier.verify("not-a-jwt").await.is_err());
    }
}
