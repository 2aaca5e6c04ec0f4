use argon2::{
    Argon2,
    PasswordHash,
    PasswordVerifier,
    PasswordHasher,
};
use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

use crate::models::UserType;

/// Verify password using Argon2 hash stored in DB.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a new password using Argon2id with a random salt.
/// Store the returned string in persons.person_password.
#[cfg_attr(not(test), allow(dead_code))]
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut PHOsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("argon2 hash error: {e}"))
}

/// 64 random bytes, hex encoded. Used when no signing secret is configured.
pub fn generate_signing_secret() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    pub user_type: i16,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(jsonwebtoken::errors::Error),
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    #[error("unknown user type {0}")]
    UnknownUserType(i16),
}

/// HS256 keys derived from the process signing secret. Built once at start-up
/// and shared read-only.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: i64,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    pub fn issue(&self, user_id: i64, user_type: UserType) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            user_type: user_type.code(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Checks signature and expiry, then resolves the user type.
    pub fn verify(&self, token: &str) -> Result<(i64, UserType), TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(TokenError::Invalid)?;
        let claims = data.claims;
        let user_type = UserType::from_code(claims.user_type)
            .ok_or(TokenError::UnknownUserType(claims.user_type))?;
        Ok((claims.user_id, user_type))
    }
}
