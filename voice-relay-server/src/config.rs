use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use voice_relay::token::TokenIssuer;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8000;

/// Configuration for the token server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Directory served for any path the API does not handle.
    pub static_dir: Option<PathBuf>,
    /// Allowed origins for CORS (empty = allow all).
    pub allowed_origins: Vec<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            static_dir: None,
            allowed_origins: Vec::new(),
            api_key: None,
            api_secret: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with credentials from `LIVEKIT_API_KEY` / `LIVEKIT_API_SECRET`
    /// and, when set, `STATIC_DIR`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: non_empty("LIVEKIT_API_KEY"),
            api_secret: non_empty("LIVEKIT_API_SECRET"),
            static_dir: non_empty("STATIC_DIR").map(PathBuf::from),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    /// Configure allowed CORS origins
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The issuer for the configured credentials, if both are present.
    pub fn issuer(&self) -> Option<TokenIssuer> {
        let key = self.api_key.as_deref()?;
        let secret = self.api_secret.as_deref()?;
        TokenIssuer::new(key, secret).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_8000() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.addr().to_string(), "0.0.0.0:8000");
        assert!(config.issuer().is_none());
    }

    #[test]
    fn issuer_needs_both_credentials() {
        let mut config = ServerConfig::new();
        config.api_key = Some("devkey".to_string());
        assert!(config.issuer().is_none());

        let config = config.with_credentials("devkey", "secret");
        assert_eq!(config.issuer().unwrap().api_key(), "devkey");

        let blank = ServerConfig::new().with_credentials("devkey", " ");
        assert!(blank.issuer().is_none());
    }
}
