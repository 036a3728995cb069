//! Session token handling
//!
//! Sessions are minted by the external identity provider as HS256 JWTs. The
//! dashboard only verifies them; `create_session_token` exists for tooling
//! and tests that need a token the verifier accepts.

use crate::config::SessionConfig;
use crate::domain::SessionIdentity;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SESSION_TOKEN_TYPE: &str = "session";

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (principal ID)
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub iss: String,
    /// Token type discriminator (prevents token confusion attacks)
    #[serde(default)]
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Source of the caller's identity.
///
/// Any failure (bad signature, expiry, provider outage) yields `None`: the
/// caller is anonymous, never granted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self, token: &str) -> Option<SessionIdentity>;
}

/// JWT session manager
#[derive(Clone)]
pub struct JwtManager {
    config: SessionConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: SessionConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Validation with a 5 second leeway instead of the default 60.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v.validate_aud = false;
        v.set_issuer(&[&self.config.issuer]);
        v
    }

    pub fn create_session_token(
        &self,
        principal_id: Uuid,
        email: &str,
        email_verified: bool,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.token_ttl_secs);

        let claims = SessionClaims {
            sub: principal_id.to_string(),
            email: email.to_string(),
            email_verified,
            iss: self.config.issuer.clone(),
            token_type: SESSION_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(|e| AppError::Internal(e.into()))
    }

    /// Verify and decode a session token
    pub fn verify_session_token(&self, token: &str) -> Result<SessionClaims> {
        let token_data =
            decode::<SessionClaims>(token, &self.decoding_key, &self.strict_validation())?;
        let claims = token_data.claims;

        if claims.token_type != SESSION_TOKEN_TYPE {
            return Err(AppError::Unauthorized("Not a session token".to_string()));
        }
        Ok(claims)
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }
}

#[async_trait]
impl IdentityProvider for JwtManager {
    async fn current_user(&self, token: &str) -> Option<SessionIdentity> {
        let claims = match self.verify_session_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                return None;
            }
        };

        let id = Uuid::parse_str(&claims.sub).ok()?;
        Some(SessionIdentity {
            id,
            email: claims.email,
            email_confirmed: claims.email_verified,
        })
    }
}
