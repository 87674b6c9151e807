//! Authentication module
//!
//! Token issuance and validation, password hashing, email validation and the
//! orchestrating `AuthService`, plus the HTTP handlers that expose it.

pub mod api_key;
pub mod handlers;
pub mod password;
pub mod service;
pub mod token;
pub mod validator;

pub use api_key::ApiKey;
pub use service::{
    AuthService, AuthToken, Credentials, RefreshTokenBody, RegisterRequest, TokenPair,
    VerifiedUser, VerifyRequest,
};
pub use token::{Claims, TokenKind, TokenLifetimes, TokenService};
