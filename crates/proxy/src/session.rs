// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle over the cache's paired mirror entries.
//!
//! An active session is two cache entries: `token → claim-json` for
//! request-time lookup and `user_id → token` for idempotent re-login and
//! O(1) revocation. Both are written on login and deleted together on
//! logout, deactivate, and password change.

use crate::cache::SessionCache;
use crate::token::{Claim, TokenCodec};

/// Establish a session for `claim`, reusing an existing token when the user
/// is already logged in.
pub async fn establish(
    cache: &dyn SessionCache,
    codec: &TokenCodec,
    claim: &Claim,
) -> anyhow::Result<String> {
    if let Some(existing) = cache.get(&claim.user_id).await? {
        return Ok(existing);
    }
    let token = codec.issue(claim)?;
    cache.set(&token, &serde_json::to_string(claim)?).await?;
    cache.set(&claim.user_id, &token).await?;
    Ok(token)
}

/// Drop both mirror entries for `user_id`.
///
/// The `token → claim` entry goes first: the auth gate checks it before
/// anything else, so a crash between the two deletes still leaves the
/// session unusable.
pub async fn revoke(cache: &dyn SessionCache, user_id: &str) -> anyhow::Result<()> {
    if let Some(token) = cache.get(user_id).await? {
        cache.delete(&token).await?;
    }
    cache.delete(user_id).await?;
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
