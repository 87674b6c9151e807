use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::{AppError, AuthError};

/// Claims carried by every token this service signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Both kinds share the claim shape and differ only in lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Auth,
    Refresh,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub auth: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        let seconds = |name: &str, secs: i64| {
            Duration::try_seconds(secs)
                .ok_or_else(|| AppError::ConfigError(format!("{} out of range: {}", name, secs)))
        };

        Ok(Self {
            auth: seconds("auth.auth_token_ttl_secs", config.auth_token_ttl_secs)?,
            refresh: seconds("auth.refresh_token_ttl_secs", config.refresh_token_ttl_secs)?,
        })
    }

    pub fn for_kind(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Auth => self.auth,
            TokenKind::Refresh => self.refresh,
        }
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            auth: Duration::hours(1),
            refresh: Duration::days(30),
        }
    }
}

/// Signs and verifies HS256 tokens with a key fixed at construction.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetimes: TokenLifetimes,
}

impl TokenService {
    pub fn new(secret: &str, lifetimes: TokenLifetimes) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::ConfigError("token signing secret is empty".into()));
        }

        // Expiry is checked against our own clock in `validate_token_at`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetimes,
        })
    }

    pub fn create_token(&self, email: &str, lifetime: Duration) -> Result<String, AppError> {
        self.create_token_at(email, lifetime, Utc::now())
    }

    pub fn create_auth_token(&self, email: &str) -> Result<String, AppError> {
        self.create_token(email, self.lifetimes.for_kind(TokenKind::Auth))
    }

    pub fn create_refresh_token(&self, email: &str) -> Result<String, AppError> {
        self.create_token(email, self.lifetimes.for_kind(TokenKind::Refresh))
    }

    pub fn create_token_at(
        &self,
        email: &str,
        lifetime: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        if lifetime <= Duration::zero() {
            return Err(AuthError::Signing("token lifetime must be positive".into()).into());
        }

        let expires = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| AuthError::Signing("token lifetime out of range".into()))?;

        // Round up so a token never expires before `now + lifetime`.
        let exp = match expires.timestamp_subsec_nanos() {
            0 => expires.timestamp(),
            _ => expires.timestamp() + 1,
        };

        let claims = Claims {
            email: email.to_string(),
            iat: now.timestamp(),
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()).into())
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        self.validate_token_at(token, Utc::now())
    }

    /// Rejects bad signatures, any algorithm but HS256, malformed input, and
    /// tokens where `now >= exp`.
    pub fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            AuthError::InvalidToken
        })?;

        if now.timestamp() >= data.claims.exp {
            debug!("Token rejected: expired at {}", data.claims.exp);
            return Err(AuthError::InvalidToken.into());
        }

        Ok(data.claims)
    }
}
