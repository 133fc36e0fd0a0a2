// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session cache contract and adapters.
//!
//! The cache is the source of truth for token liveness: it holds the
//! paired `token → claim-json` and `user_id → token` entries that login
//! writes and logout/deactivate delete. Keys and values are plain strings;
//! single-key operations are atomic on the backend.

pub mod memory;
pub mod redis;

use async_trait::async_trait;

/// Shared key-value session store.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}
