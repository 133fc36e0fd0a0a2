// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argon2 password hashing on blocking workers.
//!
//! Hashing is the only CPU-heavy work in the proxy; it runs under
//! `spawn_blocking` so handler tasks never stall the scheduler on it.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash a plaintext password into a PHC-format string.
pub async fn hash(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))
    })
    .await?
}

/// Verify a plaintext password against a stored hash.
///
/// Any failure (unparseable hash, mismatch, cancelled worker) is `false`.
pub async fn verify(plain: String, hashed: String) -> bool {
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&hashed)
            .map(|parsed| Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok())
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}
