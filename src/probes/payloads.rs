//! Custom payload registry
//!
//! Operators can hand the chain their own SQL injection strings, XSS
//! vectors and candidate passwords. Every entry is checked against a
//! per-kind rule before it is stored, and each kind keeps its entries in
//! insertion order without duplicates. Probes receive them through
//! [`ProbeRequest::payloads`](super::ProbeRequest).

use crate::{ChainError, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SQLI_MARKERS: [&str; 6] = ["'", "\"", "or", "and", "union", "select"];
const XSS_MARKERS: [&str; 5] = ["<script", "onerror", "onload", "javascript:", "<img"];

/// Shortest candidate password accepted for SSH and FTP
pub const MIN_PASSWORD_LEN: usize = 8;

/// Payload families the registry stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Sqli,
    Xss,
    Ssh,
    Ftp,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 4] = [
        PayloadKind::Sqli,
        PayloadKind::Xss,
        PayloadKind::Ssh,
        PayloadKind::Ftp,
    ];

    fn index(self) -> usize {
        match self {
            PayloadKind::Sqli => 0,
            PayloadKind::Xss => 1,
            PayloadKind::Ssh => 2,
            PayloadKind::Ftp => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Sqli => "sqli",
            PayloadKind::Xss => "xss",
            PayloadKind::Ssh => "ssh",
            PayloadKind::Ftp => "ftp",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqli" => Ok(PayloadKind::Sqli),
            "xss" => Ok(PayloadKind::Xss),
            "ssh" => Ok(PayloadKind::Ssh),
            "ftp" => Ok(PayloadKind::Ftp),
            other => Err(ChainError::PayloadRejected(format!(
                "invalid payload type '{}'",
                other
            ))),
        }
    }
}

/// Validated custom payloads grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadRegistry {
    buckets: [Vec<String>; 4],
}

impl PayloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded from configured lists. Rejected entries are skipped.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PayloadKind, &'a str)>,
    {
        let mut registry = Self::new();
        for (kind, payload) in entries {
            if let Err(e) = registry.add(kind, payload) {
                warn!("Skipping configured {} payload: {}", kind, e);
            }
        }
        registry
    }

    /// Check a payload against the rule for its kind
    pub fn validate(kind: PayloadKind, payload: &str) -> Result<()> {
        if payload.trim().is_empty() {
            return Err(ChainError::PayloadRejected(format!(
                "empty {} payload",
                kind
            )));
        }

        let lowered = payload.to_lowercase();
        let accepted = match kind {
            PayloadKind::Sqli => SQLI_MARKERS.iter().any(|m| lowered.contains(m)),
            PayloadKind::Xss => XSS_MARKERS.iter().any(|m| lowered.contains(m)),
            PayloadKind::Ssh | PayloadKind::Ftp => {
                if payload.chars().count() < MIN_PASSWORD_LEN {
                    return Err(ChainError::PayloadRejected(format!(
                        "{} password shorter than {} characters",
                        kind.as_str().to_uppercase(),
                        MIN_PASSWORD_LEN
                    )));
                }
                true
            }
        };

        if !accepted {
            return Err(ChainError::PayloadRejected(format!(
                "'{}' does not look like a {} payload",
                payload, kind
            )));
        }
        Ok(())
    }

    /// Validate and append; duplicates within a kind are rejected
    pub fn add(&mut self, kind: PayloadKind, payload: &str) -> Result<()> {
        Self::validate(kind, payload)?;

        let bucket = &mut self.buckets[kind.index()];
        if bucket.iter().any(|existing| existing == payload) {
            return Err(ChainError::PayloadRejected(format!(
                "payload already exists in {} category",
                kind
            )));
        }

        info!("Added {} payload", kind);
        debug!("{} payload: {}", kind, payload);
        bucket.push(payload.to_string());
        Ok(())
    }

    pub fn get(&self, kind: PayloadKind) -> &[String] {
        &self.buckets[kind.index()]
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqli_rule() {
        assert!(PayloadRegistry::validate(PayloadKind::Sqli, "' OR 1=1 --").is_ok());
        assert!(PayloadRegistry::validate(PayloadKind::Sqli, "1 UNION select null").is_ok());
        assert!(matches!(
            PayloadRegistry::validate(PayloadKind::Sqli, "hello123"),
            Err(ChainError::PayloadRejected(_))
        ));
    }

    #[test]
    fn test_xss_rule() {
        assert!(PayloadRegistry::validate(PayloadKind::Xss, "<IMG src=x OnError=alert(1)>").is_ok());
        assert!(PayloadRegistry::validate(PayloadKind::Xss, "<b>bold</b>").is_err());
    }

    #[test]
    fn test_password_length_rule() {
        assert!(PayloadRegistry::validate(PayloadKind::Ssh, "short").is_err());
        assert!(PayloadRegistry::validate(PayloadKind::Ftp, "1234567").is_err());
        assert!(PayloadRegistry::validate(PayloadKind::Ftp, "12345678").is_ok());
    }

    #[test]
    fn test_blank_payload_rejected() {
        for kind in PayloadKind::ALL {
            assert!(PayloadRegistry::validate(kind, "   ").is_err(), "{}", kind);
        }
    }

    #[test]
    fn test_add_rejects_duplicates_per_kind() {
        let mut registry = PayloadRegistry::new();
        registry.add(PayloadKind::Sqli, "' OR 'a'='a").unwrap();
        assert!(matches!(
            registry.add(PayloadKind::Sqli, "' OR 'a'='a"),
            Err(ChainError::PayloadRejected(_))
        ));
        registry.add(PayloadKind::Ssh, "Winter2024!").unwrap();
        registry.add(PayloadKind::Ftp, "Winter2024!").unwrap();

        assert_eq!(registry.get(PayloadKind::Sqli), &["' OR 'a'='a".to_string()]);
        assert!(registry.get(PayloadKind::Xss).is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_from_entries_skips_rejected() {
        let registry = PayloadRegistry::from_entries([
            (PayloadKind::Xss, "<script>alert(1)</script>"),
            (PayloadKind::Xss, "plain text"),
            (PayloadKind::Ssh, "pw"),
            (PayloadKind::Xss, "<script>alert(1)</script>"),
        ]);
        assert_eq!(registry.get(PayloadKind::Xss).len(), 1);
        assert!(registry.get(PayloadKind::Ssh).is_empty());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("SQLi".parse::<PayloadKind>().unwrap(), PayloadKind::Sqli);
        assert_eq!(PayloadKind::Ftp.to_string(), "ftp");
        assert!("ldap".parse::<PayloadKind>().is_err());
    }
}
