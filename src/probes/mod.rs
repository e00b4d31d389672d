//! Protocol probe contract
//!
//! Probes are the network-facing collaborators of the chain. Each one takes a
//! [`ProbeRequest`] and returns a textual [`ProbeReport`]. Expected failures
//! such as refused connections or rejected credentials belong in the report
//! text; only exceptional conditions come back as `Err`.

pub mod payloads;
pub mod tcp;

pub use payloads::{PayloadKind, PayloadRegistry};
pub use tcp::{BannerProbe, TcpDiscoveryProbe};

use crate::config::ChainConfig;
use crate::network::ProxyEndpoint;
use crate::{ChainError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The closed set of probe roles the chain dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Discovery,
    SqlInjection,
    CrossSiteScripting,
    SshCredential,
    FtpCredential,
}

impl ProbeKind {
    /// Payload family consumed by this probe role
    pub fn payload_kind(self) -> Option<PayloadKind> {
        match self {
            ProbeKind::Discovery => None,
            ProbeKind::SqlInjection => Some(PayloadKind::Sqli),
            ProbeKind::CrossSiteScripting => Some(PayloadKind::Xss),
            ProbeKind::SshCredential => Some(PayloadKind::Ssh),
            ProbeKind::FtpCredential => Some(PayloadKind::Ftp),
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeKind::Discovery => "discovery",
            ProbeKind::SqlInjection => "sql-injection",
            ProbeKind::CrossSiteScripting => "xss",
            ProbeKind::SshCredential => "ssh-credential",
            ProbeKind::FtpCredential => "ftp-credential",
        };
        f.write_str(name)
    }
}

/// Input handed to a probe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeRequest {
    /// Address as rendered in the report (`host` or `host:port`)
    pub target: String,
    /// Bare host name or address
    pub host: String,
    /// Service port, when the probe is bound to one
    pub port: Option<u16>,
    /// Candidate username for credential probes
    pub username: Option<String>,
    /// Browser headers for web probes under stealth
    pub headers: HashMap<String, String>,
    /// Upstream proxy for web probes under stealth
    pub proxy: Option<ProxyEndpoint>,
    /// Custom payloads or candidate passwords for this probe kind
    pub payloads: Vec<String>,
}

impl ProbeRequest {
    pub fn new(target: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<ProxyEndpoint>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_payloads(mut self, payloads: &[String]) -> Self {
        self.payloads = payloads.to_vec();
        self
    }

    /// Username for credential probes; missing or blank is a validation error
    pub fn require_username(&self) -> Result<&str> {
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(ChainError::Validation("username required".to_string())),
        }
    }
}

/// Textual probe output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub text: String,
    /// Set when the probe confirmed a weakness (e.g. a credential worked)
    pub success: bool,
}

impl ProbeReport {
    pub fn finding(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

/// Single-operation probe interface
#[async_trait]
pub trait Probe: Send + Sync {
    /// Run the probe once against the request target
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeReport>;

    /// Probe name for logs
    fn name(&self) -> &str;
}

/// One probe per [`ProbeKind`]
#[derive(Clone)]
pub struct ProbeSet {
    discovery: Arc<dyn Probe>,
    sql_injection: Arc<dyn Probe>,
    cross_site_scripting: Arc<dyn Probe>,
    ssh_credential: Arc<dyn Probe>,
    ftp_credential: Arc<dyn Probe>,
}

impl ProbeSet {
    pub fn new(
        discovery: Arc<dyn Probe>,
        sql_injection: Arc<dyn Probe>,
        cross_site_scripting: Arc<dyn Probe>,
        ssh_credential: Arc<dyn Probe>,
        ftp_credential: Arc<dyn Probe>,
    ) -> Self {
        Self {
            discovery,
            sql_injection,
            cross_site_scripting,
            ssh_credential,
            ftp_credential,
        }
    }

    /// The same probe for every role
    pub fn uniform(probe: Arc<dyn Probe>) -> Self {
        Self::new(
            probe.clone(),
            probe.clone(),
            probe.clone(),
            probe.clone(),
            probe,
        )
    }

    /// TCP discovery plus banner checks for every follow-up role
    pub fn builtin(config: &ChainConfig) -> Self {
        let timeout = config.probe_timeout();
        Self::new(
            Arc::new(
                TcpDiscoveryProbe::new(config.discovery_ports.clone(), timeout)
                    .with_concurrency(config.discovery_concurrency),
            ),
            Arc::new(BannerProbe::new("Web", timeout)),
            Arc::new(BannerProbe::new("Web", timeout)),
            Arc::new(BannerProbe::new("SSH", timeout)),
            Arc::new(BannerProbe::new("FTP", timeout)),
        )
    }

    /// Replace the probe bound to `kind`
    pub fn with(mut self, kind: ProbeKind, probe: Arc<dyn Probe>) -> Self {
        match kind {
            ProbeKind::Discovery => self.discovery = probe,
            ProbeKind::SqlInjection => self.sql_injection = probe,
            ProbeKind::CrossSiteScripting => self.cross_site_scripting = probe,
            ProbeKind::SshCredential => self.ssh_credential = probe,
            ProbeKind::FtpCredential => self.ftp_credential = probe,
        }
        self
    }

    pub fn get(&self, kind: ProbeKind) -> &dyn Probe {
        match kind {
            ProbeKind::Discovery => self.discovery.as_ref(),
            ProbeKind::SqlInjection => self.sql_injection.as_ref(),
            ProbeKind::CrossSiteScripting => self.cross_site_scripting.as_ref(),
            ProbeKind::SshCredential => self.ssh_credential.as_ref(),
            ProbeKind::FtpCredential => self.ftp_credential.as_ref(),
        }
    }
}
