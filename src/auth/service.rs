use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::TokenService;
use crate::auth::validator::validate_email;
use crate::db::{CredentialStore, NewUser, UserPublic};
use crate::error::{AppError, AuthError};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// How a caller proves identity to `verify_user`.
#[derive(Debug)]
pub enum VerifyRequest {
    Credentials(Credentials),
    BearerToken(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub auth_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub auth_token: String,
    pub refresh_token: String,
    pub user: UserPublic,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken {
    pub auth_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenBody {
    pub refresh_token: String,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Validate, hash, issue both tokens, then persist. Tokens issued before a
    /// failed insert are dropped with the error.
    pub async fn register(&self, req: RegisterRequest) -> Result<TokenPair, AppError> {
        validate_email(&req.email)?;
        if req.password.is_empty() {
            return Err(AppError::ValidationError("password must not be empty".into()));
        }

        let RegisterRequest { email, password, display_name } = req;
        let password_hash = run_blocking(move || hash_password(&password)).await?;

        let pair = self.issue_pair(&email)?;

        self.store
            .insert(NewUser {
                email: email.clone(),
                password_hash,
                display_name,
            })
            .await
            .map_err(|e| {
                warn!("Registration failed for email: {}: {}", email, e);
                e
            })?;

        info!("Registered user {}", email);
        Ok(pair)
    }

    pub async fn verify_user(&self, req: VerifyRequest) -> Result<VerifiedUser, AppError> {
        let (email, password) = match req {
            VerifyRequest::Credentials(Credentials { email, password }) => (email, Some(password)),
            VerifyRequest::BearerToken(token) => (self.tokens.validate_token(&token)?.email, None),
        };

        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Some(password) = password {
            let hash = user.password_hash.clone();
            let matches = run_blocking(move || verify_password(&hash, &password)).await?;
            if !matches {
                info!("Password mismatch for email: {}", email);
                return Err(AuthError::InvalidCredentials.into());
            }
        }

        let TokenPair { auth_token, refresh_token } = self.issue_pair(&user.email)?;
        info!("Verified user {}", user.email);

        Ok(VerifiedUser {
            auth_token,
            refresh_token,
            user: user.public_view(),
        })
    }

    /// Issue a new auth token for the account behind a refresh token. An
    /// account that no longer exists reads as an invalid token.
    pub async fn refresh_auth_token(&self, refresh_token: &str) -> Result<AuthToken, AppError> {
        let claims = self.tokens.validate_token(refresh_token)?;

        let Some(user) = self.store.find_by_email(&claims.email).await? else {
            warn!("Refresh token presented for unknown account {}", claims.email);
            return Err(AuthError::InvalidToken.into());
        };

        Ok(AuthToken {
            auth_token: self.tokens.create_auth_token(&user.email)?,
        })
    }

    pub fn validate_refresh_token(&self, refresh_token: String) -> Result<String, AppError> {
        self.tokens.validate_token(&refresh_token)?;
        Ok(refresh_token)
    }

    fn issue_pair(&self, email: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            auth_token: self.tokens.create_auth_token(email)?,
            refresh_token: self.tokens.create_refresh_token(email)?,
        })
    }
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn run_blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::InternalError(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenLifetimes;
    use crate::db::{MockCredentialStore, User};
    use crate::error::{DatabaseError, INTERNAL_SERVER_ERROR};
    use actix_web::{http::StatusCode, ResponseError};
    use chrono::{Duration, Utc};
    use mockall::predicate::function;

    fn service(store: MockCredentialStore) -> AuthService {
        let tokens = TokenService::new("test_secret", TokenLifetimes::default()).unwrap();
        AuthService::new(Arc::new(store), tokens)
    }

    fn stored_user(email: &str, password: &str) -> User {
        NewUser {
            email: email.to_string(),
            password_hash: hash_password(password).unwrap(),
            display_name: "A".to_string(),
        }
        .into_user()
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: "A".to_string(),
        }
    }

    fn credentials(email: &str, password: &str) -> VerifyRequest {
        VerifyRequest::Credentials(Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn register_hashes_password_and_issues_tokens() {
        let mut store = MockCredentialStore::new();
        store
            .expect_insert()
            .times(1)
            .withf(|u| u.email == "a@b.com" && u.password_hash != "secret123" && u.display_name == "A")
            .returning(|u| Ok(u.into_user()));
        let auth = service(store);

        let pair = auth.register(register_request("a@b.com", "secret123")).await.unwrap();
        assert!(!pair.auth_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert_eq!(auth.tokens().validate_token(&pair.auth_token).unwrap().email, "a@b.com");
    }

    #[tokio::test]
    async fn register_rejects_invalid_input_without_writing() {
        let mut store = MockCredentialStore::new();
        store.expect_insert().never();
        let auth = service(store);

        let err = auth.register(register_request("not-an-email", "secret123")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = auth.register(register_request("a@b.com", "")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn register_surfaces_store_failures() {
        let mut store = MockCredentialStore::new();
        store
            .expect_insert()
            .times(1)
            .returning(|_| Err(DatabaseError::Duplicate.into()));
        let auth = service(store);

        let err = auth.register(register_request("a@b.com", "secret123")).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::Duplicate)));
    }

    fn assert_internal(err: &AppError) {
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::QueryError(_))));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn register_insert_failure_is_internal() {
        let mut store = MockCredentialStore::new();
        store
            .expect_insert()
            .times(1)
            .returning(|_| Err(DatabaseError::QueryError("connection reset".into()).into()));
        let auth = service(store);

        let err = auth.register(register_request("a@b.com", "secret123")).await.unwrap_err();
        assert_internal(&err);
    }

    #[tokio::test]
    async fn refresh_lookup_failure_is_internal() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_email()
            .with(function(|e: &str| e == "a@b.com"))
            .times(1)
            .returning(|_| Err(DatabaseError::QueryError("connection reset".into()).into()));
        let auth = service(store);

        let refresh = auth.tokens().create_refresh_token("a@b.com").unwrap();
        let err = auth.refresh_auth_token(&refresh).await.unwrap_err();
        assert_internal(&err);
    }

    #[tokio::test]
    async fn verify_with_credentials() {
        let user = stored_user("a@b.com", "secret123");
        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_email()
            .with(function(|e: &str| e == "a@b.com"))
            .returning(move |_| Ok(Some(user.clone())));
        let auth = service(store);

        let verified = auth.verify_user(credentials("a@b.com", "secret123")).await.unwrap();
        assert_eq!(verified.user.email, "a@b.com");
        assert!(auth.tokens().validate_token(&verified.refresh_token).is_ok());

        let err = auth.verify_user(credentials("a@b.com", "wrong")).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn verify_with_bearer_skips_password() {
        let user = stored_user("a@b.com", "secret123");
        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_email()
            .with(function(|e: &str| e == "a@b.com"))
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        let auth = service(store);

        let token = auth.tokens().create_auth_token("a@b.com").unwrap();
        let verified = auth.verify_user(VerifyRequest::BearerToken(token)).await.unwrap();
        assert_eq!(verified.user.email, "a@b.com");
    }

    #[tokio::test]
    async fn verify_with_bad_bearer_never_hits_store() {
        let mut store = MockCredentialStore::new();
        store.expect_find_by_email().never();
        let auth = service(store);

        let err = auth
            .verify_user(VerifyRequest::BearerToken("garbage".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn verify_distinguishes_missing_user_from_store_failure() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_email()
            .with(function(|e: &str| e == "ghost@b.com"))
            .returning(|_| Ok(None));
        store
            .expect_find_by_email()
            .with(function(|e: &str| e == "broken@b.com"))
            .returning(|_| Err(DatabaseError::QueryError("connection reset".into()).into()));
        let auth = service(store);

        let err = auth.verify_user(credentials("ghost@b.com", "x")).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::UserNotFound)));

        let err = auth.verify_user(credentials("broken@b.com", "x")).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::QueryError(_))));
    }

    #[tokio::test]
    async fn refresh_issues_auth_token_only() {
        let user = stored_user("a@b.com", "secret123");
        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        let auth = service(store);

        let refresh = auth.tokens().create_refresh_token("a@b.com").unwrap();
        let issued = auth.refresh_auth_token(&refresh).await.unwrap();
        let claims = auth.tokens().validate_token(&issued.auth_token).unwrap();
        assert_eq!(claims.email, "a@b.com");
        assert!((3600..=3601).contains(&(claims.exp - claims.iat)));
    }

    #[tokio::test]
    async fn refresh_rejects_expired_token_and_missing_account() {
        let mut store = MockCredentialStore::new();
        store.expect_find_by_email().times(1).returning(|_| Ok(None));
        let auth = service(store);

        let expired = auth
            .tokens()
            .create_token_at("a@b.com", Duration::hours(1), Utc::now() - Duration::hours(2))
            .unwrap();
        let err = auth.refresh_auth_token(&expired).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));

        let orphan = auth.tokens().create_refresh_token("gone@b.com").unwrap();
        let err = auth.refresh_auth_token(&orphan).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn validate_refresh_echoes_token_unchanged() {
        let mut store = MockCredentialStore::new();
        store.expect_find_by_email().never();
        store.expect_insert().never();
        let auth = service(store);

        let refresh = auth.tokens().create_refresh_token("a@b.com").unwrap();
        let first = auth.validate_refresh_token(refresh.clone()).unwrap();
        let second = auth.validate_refresh_token(first.clone()).unwrap();
        assert_eq!(first, refresh);
        assert_eq!(second, refresh);

        let err = auth.validate_refresh_token("bad".into()).unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }
}
