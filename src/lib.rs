//! Chainscan - phased security assessment orchestrator
//!
//! Discovers the services a single host exposes, then walks a fixed chain of
//! protocol probes against them while pacing requests through a stealth
//! policy. Only run it against systems you are authorized to test.

pub mod chain;
pub mod config;
pub mod discovery;
pub mod error;
pub mod network;
pub mod output;
pub mod probes;
pub mod utils;

// Re-export commonly used types
pub use chain::{ChainOrchestrator, ChainOutcome, Phase, ScanSession};
pub use config::{ChainConfig, PayloadSettings, StealthSettings};
pub use discovery::{ServiceCatalog, ServiceCategory, ServiceClassifier};
pub use error::ChainError;
pub use network::{ProxyEndpoint, StealthPolicy};
pub use output::{ProgressEvent, ProgressSink};
pub use probes::{
    PayloadKind, PayloadRegistry, Probe, ProbeKind, ProbeReport, ProbeRequest, ProbeSet,
};
pub use utils::target_parser::Target;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ChainError>;
