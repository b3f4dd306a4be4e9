//! Listener configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::Credentials;
use crate::error::ConfigError;

pub const DEFAULT_LISTEN: &str = "*:10443";
pub const DEFAULT_CERT_PATH: &str = "server.crt";
pub const DEFAULT_KEY_PATH: &str = "server.key";

pub const ENV_LISTEN: &str = "RZLBUS_LISTEN";
pub const ENV_CERT_PATH: &str = "RZLBUS_SSL_CERT";
pub const ENV_KEY_PATH: &str = "RZLBUS_SSL_KEY";
pub const ENV_REBOOT_USER: &str = "RZLBUS_REBOOT_USER";
pub const ENV_REBOOT_PASSWORD: &str = "RZLBUS_REBOOT_PASSWORD";

/// Everything the HTTP layer needs to start
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port`; `*:port` and `:port` mean every IPv4 interface
    /// Default: "*:10443"
    pub listen: String,

    /// Certificate chain in PEM format
    /// Default: "server.crt"
    pub cert_path: PathBuf,

    /// Private key in PEM format
    /// Default: "server.key"
    pub key_path: PathBuf,

    /// Static credential for `/_/reboot`
    /// Default: empty, which keeps the route locked
    pub credentials: Credentials,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            cert_path: PathBuf::from(DEFAULT_CERT_PATH),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            credentials: Credentials::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with the `RZLBUS_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable name
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(listen) = lookup(ENV_LISTEN) {
            config.listen = listen;
        }
        if let Some(path) = lookup(ENV_CERT_PATH) {
            config.cert_path = path.into();
        }
        if let Some(path) = lookup(ENV_KEY_PATH) {
            config.key_path = path.into();
        }
        if let Some(user) = lookup(ENV_REBOOT_USER) {
            config.credentials.username = user;
        }
        if let Some(password) = lookup(ENV_REBOOT_PASSWORD) {
            config.credentials.password = password;
        }
        config
    }

    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.cert_path = cert_path.into();
        self.key_path = key_path.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_listen_addr(&self.listen)
    }
}

/// Parse a listen address
///
/// Accepts plain socket addresses, resolvable `host:port` pairs, and the
/// wildcard forms `*:port` / `:port`.
pub fn parse_listen_addr(listen: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidListenAddress(listen.to_string());
    let trimmed = listen.trim();

    if let Some(port) = trimmed.strip_prefix("*:").or_else(|| trimmed.strip_prefix(':')) {
        let port: u16 = port.parse().map_err(|_| invalid())?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }

    if let Ok(addr) = trimmed.parse::<SocketAddr>() {
        return Ok(addr);
    }

    trimmed
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "*:10443");
        assert_eq!(config.cert_path, PathBuf::from("server.crt"));
        assert_eq!(config.key_path, PathBuf::from("server.key"));
        assert!(config.credentials.is_empty());
        assert_eq!(
            config.listen_addr().unwrap(),
            "0.0.0.0:10443".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            (ENV_LISTEN, "127.0.0.1:8443"),
            (ENV_CERT_PATH, "/etc/rzlbus/cert.pem"),
            (ENV_REBOOT_USER, "foo"),
            (ENV_REBOOT_PASSWORD, "bar"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.listen, "127.0.0.1:8443");
        assert_eq!(config.cert_path, PathBuf::from("/etc/rzlbus/cert.pem"));
        // untouched variables keep their defaults
        assert_eq!(config.key_path, PathBuf::from("server.key"));
        assert_eq!(config.credentials, Credentials::new("foo", "bar"));
    }

    #[test]
    fn test_parse_listen_addr_forms() {
        let any = |port| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        assert_eq!(parse_listen_addr("*:10443").unwrap(), any(10443));
        assert_eq!(parse_listen_addr(":8080").unwrap(), any(8080));
        assert_eq!(
            parse_listen_addr("[::1]:9000").unwrap(),
            "[::1]:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_listen_addr("localhost:9000").unwrap().port(), 9000);
    }

    #[test]
    fn test_parse_listen_addr_rejects_garbage() {
        for bad in ["", "*:", "*:http", "10443", "not an address"] {
            assert_eq!(
                parse_listen_addr(bad),
                Err(ConfigError::InvalidListenAddress(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"listen": "127.0.0.1:0", "credentials": {"username": "foo"}}"#,
        )
        .unwrap();
        assert_eq!(config.listen, "127.0.0.1:0");
        assert_eq!(config.credentials.username, "foo");
        assert_eq!(config.credentials.password, "");
        assert_eq!(config.cert_path, PathBuf::from(DEFAULT_CERT_PATH));
    }
}
