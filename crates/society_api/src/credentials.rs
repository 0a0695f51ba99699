use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::{MemberId, Role, SocietyId};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: MemberId,
    pub mobile: String,
    pub role: Role,
    pub society_id: Option<SocietyId>,
    pub iat: i64,
    pub exp: i64,
}

/// Password hashing and session tokens.
pub trait CredentialService: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
    fn issue_token(
        &self,
        member_id: MemberId,
        mobile: &str,
        role: Role,
        society_id: Option<SocietyId>,
    ) -> Result<String>;
    /// Returns `None` for tokens that are malformed, forged or expired.
    fn decode_token(&self, token: &str) -> Option<SessionClaims>;
}

/// Argon2id password hashes and HS256 session tokens.
#[derive(Debug, Clone)]
pub struct Argon2JwtCredentials {
    secret: String,
    ttl_seconds: i64,
}

impl Argon2JwtCredentials {
    pub fn new(secret: impl Into<String>, ttl_seconds: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_seconds,
        }
    }
}

impl CredentialService for Argon2JwtCredentials {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("password hashing failed: {e}"))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| anyhow!("stored password hash is invalid: {e}"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    fn issue_token(
        &self,
        member_id: MemberId,
        mobile: &str,
        role: Role,
        society_id: Option<SocietyId>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl_seconds);
        let claims = SessionClaims {
            id: member_id,
            mobile: mobile.to_string(),
            role,
            society_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    fn decode_token(&self, token: &str) -> Option<SessionClaims> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .ok()
        .map(|data| data.claims)
    }
}

#[cfg(test)]
#[path = "tests/credentials_tests.rs"]
mod tests;
