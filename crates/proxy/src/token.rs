// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer token codec: HMAC-signed identity claims in a URL-safe wrapper.
//!
//! A token is `base64url_nopad(claim_json || hmac_sha256_tag)`. The token is
//! tamper-evident but not a capability on its own: the session cache must
//! still confirm it on every request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity payload signed into a token and mirrored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub user_id: String,
    pub username: String,
}

/// Opaque decode failure. Bad encoding, a truncated blob, a forged tag,
/// and malformed claim JSON are deliberately indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidToken;

impl fmt::Display for InvalidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid token")
    }
}

impl std::error::Error for InvalidToken {}

/// HMAC-SHA256 tag length in bytes.
const TAG_LEN: usize = 32;

/// Signs claims into bearer strings and verifies them back.
pub struct TokenCodec {
    key: hmac::Key,
}

impl TokenCodec {
    /// Build a codec from the process-wide signing secret.
    ///
    /// An empty secret is accepted; `run()` warns loudly about it at startup.
    pub fn new(secret: &str) -> Self {
        Self { key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()) }
    }

    /// Produce an opaque bearer string carrying the claim.
    pub fn issue(&self, claim: &Claim) -> anyhow::Result<String> {
        let mut blob = serde_json::to_vec(claim)?;
        let tag = hmac::sign(&self.key, &blob);
        blob.extend_from_slice(tag.as_ref());
        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    /// Verify a bearer string and recover the claim.
    pub fn decode(&self, token: &str) -> Result<Claim, InvalidToken> {
        let blob = URL_SAFE_NO_PAD.decode(token).map_err(|_| InvalidToken)?;
        if blob.len() <= TAG_LEN {
            return Err(InvalidToken);
        }
        let (payload, tag) = blob.split_at(blob.len() - TAG_LEN);
        hmac::verify(&self.key, payload, tag).map_err(|_| InvalidToken)?;
        serde_json::from_slice(payload).map_err(|_| InvalidToken)
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
