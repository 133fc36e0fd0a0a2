// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable user store contract and adapters.
//!
//! Users live in two partitions: `users` (active) and `deactivated_users`.
//! A username is unique within each partition; a `user_id` is minted once at
//! creation and survives deactivate/reactivate cycles.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::fmt;

/// One credential row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub hashed_password: String,
}

#[derive(Debug)]
pub enum StoreError {
    /// Username already present in the target partition.
    Conflict,
    /// The backend could not be reached or rejected the statement.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => f.write_str("username already exists"),
            Self::Unavailable(msg) => write!(f, "user store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable user storage.
///
/// `create` mints a fresh `user_id`; callers pass usernames already
/// case-folded to lowercase. `deactivate`/`reactivate` move the row between
/// partitions atomically and report whether a row was found.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, username: &str, hashed_password: &str)
        -> Result<UserRecord, StoreError>;
    async fn get_active_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn get_active_by_username(&self, username: &str)
        -> Result<Option<UserRecord>, StoreError>;
    async fn update_password(&self, user_id: &str, hashed_password: &str)
        -> Result<bool, StoreError>;
    async fn deactivate(&self, user_id: &str) -> Result<bool, StoreError>;
    async fn reactivate(&self, user_id: &str) -> Result<bool, StoreError>;
}
