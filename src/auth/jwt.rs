//! Access token verification
//!
//! Tokens are issued by the account service and signed with HS256 using the
//! shared `ACCESS_TOKEN_SECRET`; this service only verifies them.

use bson::oid::ObjectId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::MIN_SECRET_LEN;
use crate::types::{AppError, Result};

/// Name of the cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Payload of an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User id as a hex ObjectId
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub user_name: String,
    pub full_name: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    pub fn user_id(&self) -> Result<ObjectId> {
        ObjectId::parse_str(&self.id)
            .map_err(|_| AppError::Unauthorized("Invalid access token".into()))
    }
}

/// JWT validator and generator
#[derive(Clone)]
pub struct JwtValidator {
    secret: String,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(AppError::Config(
                "ACCESS_TOKEN_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "ACCESS_TOKEN_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            secret,
            expiry_seconds,
        })
    }

    /// Validator for dev mode when no secret is configured
    pub fn new_dev() -> Self {
        Self {
            secret: "videotube-dev-access-token-secret-do-not-deploy".into(),
            expiry_seconds: 24 * 60 * 60,
        }
    }

    /// Sign a token for a user; used by dev tooling and tests
    pub fn generate_token(
        &self,
        user_id: ObjectId,
        email: &str,
        user_name: &str,
        full_name: &str,
    ) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            id: user_id.to_hex(),
            email: email.to_string(),
            user_name: user_name.to_string(),
            full_name: full_name.to_string(),
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify and decode a token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let reason = match err.kind() {
                ErrorKind::ExpiredSignature => "Access token expired",
                ErrorKind::InvalidSignature => "Invalid token signature",
                _ => "Invalid access token",
            };
            AppError::Unauthorized(reason.into())
        })
    }
}

/// Extract token from an Authorization header ("Bearer <token>")
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Extract the access token from a Cookie header
pub fn extract_token_from_cookie(cookie_header: Option<&str>) -> Option<&str> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
