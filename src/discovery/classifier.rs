//! Classification of raw discovery output into a service catalog

use super::{ServiceCatalog, ServiceCategory};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static OPEN_PORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)/tcp\s+open\s+(\w+)").expect("open port pattern is valid")
});

/// Parses `<port>/tcp open <service>` entries out of free-form text
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceClassifier;

impl ServiceClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Build a fresh catalog from discovery text. Text without any entry
    /// yields an empty catalog.
    pub fn classify(&self, raw: &str) -> ServiceCatalog {
        let mut catalog = ServiceCatalog::new();

        for captures in OPEN_PORT_PATTERN.captures_iter(raw) {
            let port = match captures[1].parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    debug!("Skipping out-of-range port entry: {}", &captures[0]);
                    continue;
                }
            };
            let service = captures[2].to_ascii_lowercase();
            let category = ServiceCategory::from_service(&service);

            debug!("Classified {}/tcp ({}) as {}", port, service, category);
            catalog.push(category, port);
        }

        catalog
    }
}

/// Well-known service name for a port, used when rendering discovery output
pub fn service_name_for_port(port: u16) -> &'static str {
    match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 | 8000 | 8080 => "http",
        110 => "pop3",
        143 => "imap",
        443 | 8443 => "https",
        445 => "microsoft-ds",
        993 => "imaps",
        995 => "pop3s",
        1433 => "ms-sql-s",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        5432 => "postgresql",
        6379 => "redis",
        27017 => "mongodb",
        _ => "unknown",
    }
}
