// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory user store for tests and single-process development.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::{StoreError, UserRecord, UserStore};

#[derive(Default)]
struct Partitions {
    active: Vec<UserRecord>,
    deactivated: Vec<UserRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Partitions>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(
        &self,
        username: &str,
        hashed_password: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.active.iter().any(|u| u.username == username) {
            return Err(StoreError::Conflict);
        }
        let user = UserRecord {
            user_id: uuid::Uuid::new_v4().to_string(),
            username: username.to_owned(),
            hashed_password: hashed_password.to_owned(),
        };
        inner.active.push(user.clone());
        Ok(user)
    }

    async fn get_active_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.active.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn get_active_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.active.iter().find(|u| u.username == username).cloned())
    }

    async fn update_password(
        &self,
        user_id: &str,
        hashed_password: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.active.iter_mut().find(|u| u.user_id == user_id) {
            Some(user) => {
                user.hashed_password = hashed_password.to_owned();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.active.iter().position(|u| u.user_id == user_id) {
            Some(idx) => {
                let user = inner.active.remove(idx);
                inner.deactivated.push(user);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reactivate(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.deactivated.iter().position(|u| u.user_id == user_id) {
            Some(idx) => {
                let user = inner.deactivated.remove(idx);
                inner.active.push(user);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
