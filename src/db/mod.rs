//! Database module for the auth service
//!
//! Account persistence behind the `CredentialStore` trait, with the
//! Postgres implementation in `operations`.

pub mod models;
pub mod operations;

pub use models::{NewUser, User, UserPublic};
pub use operations::{CredentialStore, DbOperations};

#[cfg(test)]
pub use operations::MockCredentialStore;
