//! Error handling for the chainscan orchestrator
//!
//! Expected probe failures (refused connections, rejected credentials) are
//! rendered as report text by the probes themselves. Everything in this enum
//! is a fault that crosses a component boundary.

use thiserror::Error;

/// Main error type for chain operations
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Probe timed out: {0}")]
    ProbeTimeout(String),

    #[error("Probe connection error: {0}")]
    ProbeConnection(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Stealth operation failed: {0}")]
    Stealth(String),

    #[error("Proxy rejected: {0}")]
    ProxyRejected(String),

    #[error("Payload rejected: {0}")]
    PayloadRejected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Progress delivery failed: {0}")]
    SinkDelivery(String),

    #[error("Scan cancelled")]
    Cancelled,
}

impl ChainError {
    /// Whether the error originated inside a protocol probe
    pub fn is_probe_fault(&self) -> bool {
        matches!(
            self,
            ChainError::ProbeTimeout(_) | ChainError::ProbeConnection(_) | ChainError::Probe(_)
        )
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(format!("Failed to parse TOML: {}", err))
    }
}
