//! Credentials handed to callers: opaque one-time tokens, password hashes and
//! signed access/refresh tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::entities::user;
use crate::errors::ServiceError;

/// Opaque URL-safe token from 32 random bytes, used for email confirmation and
/// password reset links.
pub fn generate_url_safe_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub tipo: String,
    pub token_use: TokenUse,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// HS256 signer for access/refresh pairs.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_secs: access_ttl_secs as i64,
            refresh_ttl_secs: refresh_ttl_secs as i64,
        }
    }

    pub fn issue(&self, user: &user::Model) -> Result<TokenPair, ServiceError> {
        let access_token = self.sign(user, TokenUse::Access, self.access_ttl_secs)?;
        let refresh_token = self.sign(user, TokenUse::Refresh, self.refresh_ttl_secs)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl_secs,
        })
    }

    fn sign(&self, user: &user::Model, token_use: TokenUse, ttl: i64) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            tipo: user.tipo.to_string(),
            token_use,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl)).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token signing failed: {}", e)))
    }

    /// Decodes and checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, ServiceError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| ServiceError::Unauthorized("token inválido".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;

    fn user() -> user::Model {
        let now = Utc::now();
        user::Model {
            id: 7,
            nome: "Ana".into(),
            email: "ana@example.com".into(),
            senha_hash: String::new(),
            tipo: UserRole::Cliente,
            ativo: true,
            email_confirmado: true,
            token_confirmacao: None,
            token_expiracao: None,
            token_reset: None,
            token_reset_expiracao: None,
            telefone: None,
            endereco: None,
            data_criacao: now,
            data_atualizacao: now,
        }
    }

    #[test]
    fn url_safe_tokens_are_unique_and_unpadded() {
        let a = generate_url_safe_token();
        let b = generate_url_safe_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("segredo1").unwrap();
        assert!(verify_password("segredo1", &hash));
        assert!(!verify_password("segredo2", &hash));
        assert!(!verify_password("segredo1", "not-a-hash"));
    }

    #[test]
    fn issued_tokens_carry_identity() {
        let issuer = TokenIssuer::new("a".repeat(32), 3600, 7200);
        let pair = issuer.issue(&user()).unwrap();
        let access = issuer.verify(&pair.access_token).unwrap();
        assert_eq!(access.sub, "7");
        assert_eq!(access.tipo, "Cliente");
        assert_eq!(access.token_use, TokenUse::Access);
        let refresh = issuer.verify(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_use, TokenUse::Refresh);
        assert!(refresh.exp > access.exp);

        let other = TokenIssuer::new("b".repeat(32), 3600, 7200);
        assert!(other.verify(&pair.access_token).is_err());
    }
}
