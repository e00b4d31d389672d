//! Proxy endpoint parsing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proxy protocols the pool accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
            ProxyScheme::Socks4 => "socks4",
            ProxyScheme::Socks5 => "socks5",
        }
    }
}

impl FromStr for ProxyScheme {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyScheme::Http),
            "https" => Ok(ProxyScheme::Https),
            "socks4" => Ok(ProxyScheme::Socks4),
            "socks5" => Ok(ProxyScheme::Socks5),
            _ => Err(()),
        }
    }
}

/// A validated `scheme://host:port` proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
}

impl ProxyEndpoint {
    /// Parse `scheme://host:port` or bare `host:port` (scheme defaults to
    /// http). Returns `None` on any malformed or out-of-range part.
    pub fn parse(uri: &str) -> Option<Self> {
        let uri = uri.trim();
        let (scheme, rest) = match uri.split_once("://") {
            Some((scheme, rest)) => (scheme.parse::<ProxyScheme>().ok()?, rest),
            None => (ProxyScheme::Http, uri),
        };

        let (host, port) = rest.rsplit_once(':')?;
        if host.is_empty() || host.contains('/') || host.chars().any(char::is_whitespace) {
            return None;
        }

        // Parse wide so 70000 reads as out of range rather than garbage
        let port: u32 = port.parse().ok()?;
        if !(1..=65535).contains(&port) {
            return None;
        }

        Some(Self {
            scheme,
            host: host.to_string(),
            port: port as u16,
        })
    }

    /// Canonical URI form used as the pool key
    pub fn uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_scheme() {
        let proxy = ProxyEndpoint::parse("socks5://10.0.0.1:1080").unwrap();
        assert_eq!(proxy.scheme, ProxyScheme::Socks5);
        assert_eq!(proxy.host, "10.0.0.1");
        assert_eq!(proxy.port, 1080);
        assert_eq!(proxy.uri(), "socks5://10.0.0.1:1080");
    }

    #[test]
    fn test_bare_host_defaults_to_http() {
        let proxy = ProxyEndpoint::parse("proxy.internal:3128").unwrap();
        assert_eq!(proxy.scheme, ProxyScheme::Http);
        assert_eq!(proxy.uri(), "http://proxy.internal:3128");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let proxy = ProxyEndpoint::parse("HTTPS://gateway:8443").unwrap();
        assert_eq!(proxy.scheme, ProxyScheme::Https);
    }

    #[test]
    fn test_rejections() {
        assert!(ProxyEndpoint::parse("10.0.0.1:70000").is_none());
        assert!(ProxyEndpoint::parse("10.0.0.1:0").is_none());
        assert!(ProxyEndpoint::parse("ftp://host:21").is_none());
        assert!(ProxyEndpoint::parse("host").is_none());
        assert!(ProxyEndpoint::parse("host:abc").is_none());
        assert!(ProxyEndpoint::parse(":8080").is_none());
        assert!(ProxyEndpoint::parse("http://host/path:80").is_none());
        assert!(ProxyEndpoint::parse("").is_none());
    }
}
