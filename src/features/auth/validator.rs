use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;

use super::jwks::JwksClient;
use super::model::Session;
use crate::core::error::AppError;

/// Turns a bearer token into a [`Session`]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Session, AppError>;
}

/// RS256 access-token validation against the Logto JWKS
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,
    issuer: String,
    audience: String,
    leeway: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    #[serde(default)]
    kind: Option<String>,
    #[serde(rename = "sessionUid", default)]
    session_uid: Option<String>,
}

impl JwtValidator {
    pub fn new(
        jwks_client: Arc<JwksClient>,
        issuer: String,
        audience: String,
        leeway: Duration,
    ) -> Self {
        Self {
            jwks_client,
            issuer,
            audience,
            leeway: leeway.as_secs(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwtValidator {
    async fn verify(&self, token: &str) -> Result<Session, AppError> {
        let header = decode_header(token).map_err(|e| AppError::Auth(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::Auth(format!(
                "Unsupported algorithm: {:?}. Only RS256 is allowed",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AppError::Auth("Missing kid in token header".to_string()))?;

        let decoding_key = self
            .jwks_client
            .get_key(&kid)
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        let claims = decode::<Claims>(token, &decoding_key, &self.validation())
            .map_err(|e| AppError::Auth(e.to_string()))?
            .claims;

        session_from_claims(claims)
    }
}

fn session_from_claims(claims: Claims) -> Result<Session, AppError> {
    // Token exchange tokens carry no `kind`
    if let Some(kind) = &claims.kind {
        if kind != "AccessToken" {
            return Err(AppError::Auth("Token is not an access token".to_string()));
        }
    }

    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .ok_or_else(|| AppError::Auth("Token expiry out of range".to_string()))?;

    Ok(Session {
        subject: claims.sub,
        session_id: claims.session_uid,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(kind: Option<&str>) -> Claims {
        Claims {
            sub: "user-1".to_string(),
            exp: 1_900_000_000,
            kind: kind.map(str::to_string),
            session_uid: Some("sess-9".to_string()),
        }
    }

    #[test]
    fn test_session_from_access_token_claims() {
        let session = session_from_claims(claims(Some("AccessToken"))).unwrap();
        assert_eq!(session.subject, "user-1");
        assert_eq!(session.session_id.as_deref(), Some("sess-9"));
        assert_eq!(session.expires_at.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_session_from_exchange_token_without_kind() {
        assert!(session_from_claims(claims(None)).is_ok());
    }

    #[test]
    fn test_rejects_non_access_tokens() {
        assert!(matches!(
            session_from_claims(claims(Some("IdToken"))),
            Err(AppError::Auth(_))
        ));
    }
}
