//! Request pacing and identity for chain probes

pub mod fingerprint;
pub mod proxy;
pub mod stealth;

pub use fingerprint::{BrowserFingerprint, Platform};
pub use proxy::{ProxyEndpoint, ProxyScheme};
pub use stealth::{StealthConfig, StealthPolicy};
