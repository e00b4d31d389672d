//! Configuration module for the chain orchestrator

use crate::probes::{PayloadKind, PayloadRegistry};
use crate::ChainError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Longest stealth delay accepted, in seconds
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Stealth pacing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthSettings {
    /// Lower bound of the random delay between probes, in seconds
    pub min_delay: f64,

    /// Upper bound of the random delay between probes, in seconds
    pub max_delay: f64,

    /// Bounds used when the request pattern is rotated
    pub rotate_min_delay: f64,
    pub rotate_max_delay: f64,

    /// Candidates tried per proxy rotation before giving up
    pub retry_budget: usize,

    /// Proxy URIs loaded into the pool at session start
    pub proxies: Vec<String>,
}

impl Default for StealthSettings {
    fn default() -> Self {
        Self {
            min_delay: 1.0,
            max_delay: 3.0,
            rotate_min_delay: 0.5,
            rotate_max_delay: 2.0,
            retry_budget: 3,
            proxies: Vec::new(),
        }
    }
}

/// Operator-supplied payloads handed to the follow-up probes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadSettings {
    pub sqli: Vec<String>,
    pub xss: Vec<String>,
    /// Candidate SSH passwords
    pub ssh: Vec<String>,
    /// Candidate FTP passwords
    pub ftp: Vec<String>,
}

impl PayloadSettings {
    pub fn get(&self, kind: PayloadKind) -> &[String] {
        match kind {
            PayloadKind::Sqli => &self.sqli,
            PayloadKind::Xss => &self.xss,
            PayloadKind::Ssh => &self.ssh,
            PayloadKind::Ftp => &self.ftp,
        }
    }

    fn get_mut(&mut self, kind: PayloadKind) -> &mut Vec<String> {
        match kind {
            PayloadKind::Sqli => &mut self.sqli,
            PayloadKind::Xss => &mut self.xss,
            PayloadKind::Ssh => &mut self.ssh,
            PayloadKind::Ftp => &mut self.ftp,
        }
    }

    /// Every configured entry tagged with its kind
    pub fn entries(&self) -> impl Iterator<Item = (PayloadKind, &str)> {
        PayloadKind::ALL
            .into_iter()
            .flat_map(move |kind| self.get(kind).iter().map(move |p| (kind, p.as_str())))
    }

    /// Validated registry; rejected entries are skipped with a warning
    pub fn registry(&self) -> PayloadRegistry {
        PayloadRegistry::from_entries(self.entries())
    }
}

/// Main configuration structure for chain runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Stealth pacing options
    pub stealth: StealthSettings,

    /// Custom payloads and candidate passwords
    pub payloads: PayloadSettings,

    /// Per-call timeout handed to probes, in milliseconds
    pub probe_timeout_ms: u64,

    /// Ports checked by the built-in discovery probe
    pub discovery_ports: Vec<u16>,

    /// Connection attempts the discovery probe keeps in flight at once
    pub discovery_concurrency: usize,

    /// Seed for the stealth random source; entropy when absent
    pub seed: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            stealth: StealthSettings::default(),
            payloads: PayloadSettings::default(),
            probe_timeout_ms: 3000,
            discovery_ports: vec![
                21, 22, 23, 25, 80, 110, 143, 443, 445, 993, 995, 1433, 3306, 3389, 5432, 6379,
                8000, 8080, 8443, 27017,
            ],
            discovery_concurrency: 256,
            seed: None,
        }
    }
}

impl ChainConfig {
    /// Set the stealth delay range
    pub fn with_delay_range(mut self, min_delay: f64, max_delay: f64) -> Self {
        self.stealth.min_delay = min_delay;
        self.stealth.max_delay = max_delay;
        self
    }

    /// Set the proxy pool
    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.stealth.proxies = proxies;
        self
    }

    /// Set the custom payloads of one kind
    pub fn with_payloads(mut self, kind: PayloadKind, payloads: Vec<String>) -> Self {
        *self.payloads.get_mut(kind) = payloads;
        self
    }

    /// Set the probe timeout
    pub fn with_probe_timeout(mut self, timeout_ms: u64) -> Self {
        self.probe_timeout_ms = timeout_ms;
        self
    }

    /// Set the discovery port list
    pub fn with_discovery_ports(mut self, ports: Vec<u16>) -> Self {
        self.discovery_ports = ports;
        self
    }

    /// Set how many discovery connects may run at once
    pub fn with_discovery_concurrency(mut self, concurrency: usize) -> Self {
        self.discovery_concurrency = concurrency;
        self
    }

    /// Fix the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Get probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;

        let config: ChainConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let config_path = home_dir.join(".chainscan.toml");

        if config_path.exists() {
            match Self::from_toml_file(&config_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let s = &self.stealth;
        for (lo, hi) in [(s.min_delay, s.max_delay), (s.rotate_min_delay, s.rotate_max_delay)] {
            if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || hi < 0.0 {
                return Err(ChainError::Config(format!(
                    "Delay bounds must be non-negative: {}-{}",
                    lo, hi
                )));
            }
            if hi > MAX_DELAY_SECS {
                return Err(ChainError::Config(format!(
                    "Maximum delay {} exceeds the {}s limit",
                    hi, MAX_DELAY_SECS
                )));
            }
            if lo > hi {
                return Err(ChainError::Config(format!(
                    "Minimum delay {} exceeds maximum {}",
                    lo, hi
                )));
            }
        }

        for (kind, payload) in self.payloads.entries() {
            PayloadRegistry::validate(kind, payload)
                .map_err(|e| ChainError::Config(format!("Invalid {} payload: {}", kind, e)))?;
        }

        if s.retry_budget == 0 {
            return Err(ChainError::Config(
                "Proxy retry budget must be greater than 0".to_string(),
            ));
        }

        if self.probe_timeout_ms == 0 {
            return Err(ChainError::Config(
                "Probe timeout must be greater than 0".to_string(),
            ));
        }

        if self.discovery_concurrency == 0 {
            return Err(ChainError::Config(
                "Discovery concurrency must be greater than 0".to_string(),
            ));
        }

        if self.discovery_ports.contains(&0) {
            return Err(ChainError::Config("Port 0 cannot be scanned".to_string()));
        }

        Ok(())
    }
}
