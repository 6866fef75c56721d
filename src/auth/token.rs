//! Token issuer and verifier.
//!
//! Tokens are HMAC-signed JWTs. Every verification failure (bad signature,
//! expired, malformed, wrong type) collapses into [`TokenError::Invalid`];
//! callers never learn which check failed.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AuthError, INVALID_TOKEN};

const RESERVED_CLAIMS: [&str; 6] = ["sub", "tenant_id", "type", "exp", "iat", "jti"];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("signing key is not configured")]
    MissingKey,
    #[error("unsupported signing algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Invalid => AuthError::Unauthorized(INVALID_TOKEN),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub tenant_id: Uuid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    /// Unique per token, so two tokens minted in the same second differ
    pub jti: Uuid,
    /// Caller-supplied claims carried through unchanged
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

/// Who a token is minted for.
#[derive(Debug, Clone, Default)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub extra: Map<String, Value>,
}

impl TokenSubject {
    pub fn new(user_id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            user_id,
            tenant_id,
            extra: Map::new(),
        }
    }

    pub fn with_claim(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    /// Lifetime in seconds
    pub expires_in: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn from_config(config: &AppConfig) -> Result<Self, TokenError> {
        let secret = config
            .jwt_secret_key
            .as_deref()
            .ok_or(TokenError::MissingKey)?;
        Self::new(
            secret.as_bytes(),
            &config.jwt_algorithm,
            config.access_token_ttl(),
            config.refresh_token_ttl(),
        )
    }

    pub fn new(
        secret: &[u8],
        algorithm: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        let algorithm = match algorithm {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(TokenError::UnsupportedAlgorithm(other.to_string())),
        };

        // Expiry is checked by hand so the boundary instant is exact.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "sub".to_string()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            validation,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, subject: &TokenSubject) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, TokenType::Access, Utc::now())
    }

    pub fn issue_refresh(&self, subject: &TokenSubject) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, TokenType::Refresh, Utc::now())
    }

    /// Mint a token as of `now`.
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let mut extra = subject.extra.clone();
        extra.retain(|key, _| !RESERVED_CLAIMS.contains(&key.as_str()));

        let claims = Claims {
            sub: subject.user_id,
            tenant_id: subject.tenant_id,
            token_type,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
            extra,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            claims,
            expires_in: ttl.num_seconds(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature, structure and expiry as of `now`. A token is
    /// invalid from its `exp` instant onwards.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            tracing::debug!(error_kind = ?err.kind(), "Token rejected");
            TokenError::Invalid
        })?;

        if data.claims.exp <= now.timestamp() {
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }

    /// Verify and additionally require the type discriminator.
    pub fn verify_kind(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}
