// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::cache::SessionCache;
use crate::config::ProxyConfig;
use crate::store::UserStore;
use crate::token::TokenCodec;

/// Shared proxy state.
///
/// All request handlers see this behind one `Arc`; the only mutable state
/// lives in the external cache and store, so nothing here needs a lock.
pub struct ProxyState {
    pub config: ProxyConfig,
    pub cache: Arc<dyn SessionCache>,
    pub store: Arc<dyn UserStore>,
    pub tokens: TokenCodec,
    /// Compiled `ALLOWED_HOSTS`, anchored for full-match semantics.
    pub allowed_hosts: Regex,
    /// Upstream HTTP client. Redirects are never followed: whatever status
    /// the upstream returns is the client's business, not ours.
    pub http: reqwest::Client,
    pub shutdown: CancellationToken,
}

impl ProxyState {
    pub fn new(
        config: ProxyConfig,
        cache: Arc<dyn SessionCache>,
        store: Arc<dyn UserStore>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let allowed_hosts = Regex::new(&format!("^(?:{})$", config.allowed_hosts))?;
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let tokens = TokenCodec::new(&config.signing_secret);
        Ok(Self { config, cache, store, tokens, allowed_hosts, http, shutdown })
    }
}
