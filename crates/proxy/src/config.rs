// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the wicket proxy.
#[derive(Debug, Clone, clap::Parser)]
pub struct ProxyConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8888)]
    pub port: u16,

    /// `host:port` of the proxied upstream. Required; there is nothing to
    /// forward to without it.
    #[arg(long, env = "PROXIED_HOST")]
    pub proxied_host: String,

    /// HMAC key for the token codec. Empty is permitted but loudly warned
    /// about at startup.
    #[arg(long, env = "SIGNING_SECRET", default_value = "")]
    pub signing_secret: String,

    /// Regex that request Host headers (minus port) must fully match to
    /// reach internal-only routes.
    #[arg(long, env = "ALLOWED_HOSTS", default_value = "localhost")]
    pub allowed_hosts: String,

    /// Session cache host.
    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    /// User store host.
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DB", default_value = "postgres")]
    pub postgres_db: String,

    #[arg(long, env = "POSTGRES_USER", default_value = "postgres")]
    pub postgres_user: String,

    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "")]
    pub postgres_password: String,

    /// Serve the catch-all route as a WebSocket proxy instead of an HTTP
    /// passthrough.
    #[arg(long, env = "WEBSOCKET_MODE")]
    pub websocket_mode: bool,
}

impl ProxyConfig {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:6379/", self.redis_host)
    }

    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_host,
            self.postgres_port,
            self.postgres_db
        )
    }
}
