#![allow(dead_code)]

use async_trait::async_trait;
use keystone_auth::db::{CredentialStore, NewUser, User};
use keystone_auth::error::{AppError, DatabaseError};
use keystone_auth::{AppState, Settings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const API_KEY: &str = "test_api_key";

/// Credential store backed by a map, with the same uniqueness rule as the
/// Postgres table.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryStore {
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(DatabaseError::Duplicate.into());
        }
        let user = user.into_user();
        users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(email).cloned())
    }
}

/// Store whose every call fails the way a dropped connection would.
pub struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn insert(&self, _user: NewUser) -> Result<User, AppError> {
        Err(DatabaseError::QueryError("connection reset by peer".into()).into())
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
        Err(DatabaseError::QueryError("connection reset by peer".into()).into())
    }
}

pub fn failing_state() -> AppState {
    let config = Settings::new_for_test().expect("Failed to load test config");
    AppState::with_store(config, Arc::new(FailingStore)).expect("Failed to build state")
}

pub fn test_state() -> (AppState, Arc<InMemoryStore>) {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let store = Arc::new(InMemoryStore::default());
    let state = AppState::with_store(config, store.clone()).expect("Failed to build state");
    (state, store)
}
