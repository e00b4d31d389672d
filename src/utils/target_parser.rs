//! Target parsing utilities
//!
//! Accepts a bare host, `host:port`, a bracketed IPv6 literal with a port
//! (`[::1]:8080`) or a bare IPv6 literal.

use crate::{ChainError, Result};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// A single scan target: host plus an optional explicit port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    port: Option<u16>,
}

impl Target {
    /// Build a target from parts, rejecting an empty host
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Result<Self> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(ChainError::Validation("target required".to_string()));
        }
        if port == Some(0) {
            return Err(ChainError::Validation("port 0 is not a valid target port".to_string()));
        }
        Ok(Self { host, port })
    }

    /// Parse a target string
    pub fn parse(target: &str) -> Result<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ChainError::Validation("target required".to_string()));
        }

        // Bracketed IPv6 with optional port
        if let Some(rest) = target.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                ChainError::Parse(format!("Unterminated IPv6 literal: {}", target))
            })?;
            Ipv6Addr::from_str(host)
                .map_err(|_| ChainError::Parse(format!("Invalid IPv6 address: {}", host)))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(parse_port(p)?),
                None if tail.is_empty() => None,
                None => return Err(ChainError::Parse(format!("Invalid target format: {}", target))),
            };
            return Self::new(host, port);
        }

        // Bare IPv6 literal
        if Ipv6Addr::from_str(target).is_ok() {
            return Self::new(target, None);
        }

        match target.rsplit_once(':') {
            Some((host, port)) => Self::new(host, Some(parse_port(port)?)),
            None => Self::new(target, None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Address string for a discovered service port; ports listed in
    /// `implicit` are left off.
    pub fn endpoint(&self, port: u16, implicit: &[u16]) -> String {
        if implicit.contains(&port) {
            self.host.clone()
        } else if self.host.contains(':') {
            format!("[{}]:{}", self.host, port)
        } else {
            format!("{}:{}", self.host, port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}", self.endpoint(port, &[])),
            None => write!(f, "{}", self.host),
        }
    }
}

impl FromStr for Target {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(ChainError::Parse(format!("Invalid port: {}", raw))),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host() {
        let target = Target::parse("scanme.example.org").unwrap();
        assert_eq!(target.host(), "scanme.example.org");
        assert_eq!(target.port(), None);
        assert_eq!(target.to_string(), "scanme.example.org");
    }

    #[test]
    fn test_host_with_port() {
        let target = Target::parse("192.168.1.10:8080").unwrap();
        assert_eq!(target.host(), "192.168.1.10");
        assert_eq!(target.port(), Some(8080));
        assert_eq!(target.to_string(), "192.168.1.10:8080");
    }

    #[test]
    fn test_ipv6_forms() {
        let bare = Target::parse("2001:db8::1").unwrap();
        assert_eq!(bare.host(), "2001:db8::1");
        assert_eq!(bare.port(), None);

        let bracketed = Target::parse("[::1]:2222").unwrap();
        assert_eq!(bracketed.host(), "::1");
        assert_eq!(bracketed.port(), Some(2222));
        assert_eq!(bracketed.to_string(), "[::1]:2222");
    }

    #[test]
    fn test_invalid_targets() {
        assert!(matches!(Target::parse(""), Err(ChainError::Validation(_))));
        assert!(matches!(Target::parse("   "), Err(ChainError::Validation(_))));
        assert!(Target::parse("host:notaport").is_err());
        assert!(Target::parse("host:70000").is_err());
        assert!(Target::parse("host:0").is_err());
        assert!(Target::parse("[::1").is_err());
        assert!(Target::parse(":80").is_err());
    }

    #[test]
    fn test_endpoint_rendering() {
        let target = Target::parse("10.0.0.5").unwrap();
        assert_eq!(target.endpoint(80, &[80, 443]), "10.0.0.5");
        assert_eq!(target.endpoint(443, &[80, 443]), "10.0.0.5");
        assert_eq!(target.endpoint(8080, &[80, 443]), "10.0.0.5:8080");

        let v6 = Target::parse("::1").unwrap();
        assert_eq!(v6.endpoint(2222, &[22]), "[::1]:2222");
    }
}
