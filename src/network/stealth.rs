//! Stealth pacing and request identity
//!
//! A [`StealthPolicy`] lives for exactly one chain session. It owns the
//! randomized delay between probes, the proxy pool, and the browser platform
//! the session pretends to be. All randomness flows through one injected
//! [`StdRng`] so a seeded policy is fully reproducible.

use super::fingerprint::{self, BrowserFingerprint, Platform};
use super::proxy::ProxyEndpoint;
use crate::config::{StealthSettings, MAX_DELAY_SECS};
use crate::{ChainError, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Read-only view of the policy state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StealthConfig {
    pub min_delay: f64,
    pub max_delay: f64,
    pub current_delay: f64,
    pub proxies: Vec<String>,
    pub current_proxy: Option<ProxyEndpoint>,
    pub retry_budget: usize,
    pub platform: Option<Platform>,
}

/// Session-scoped stealth state
pub struct StealthPolicy {
    min_delay: f64,
    max_delay: f64,
    current_delay: f64,
    rotate_bounds: (f64, f64),
    proxies: Vec<String>,
    current_proxy: Option<ProxyEndpoint>,
    retry_budget: usize,
    platform: Option<Platform>,
    rng: StdRng,
}

impl Default for StealthPolicy {
    fn default() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl StealthPolicy {
    /// Policy with default settings drawing from `rng`
    pub fn with_rng(rng: StdRng) -> Self {
        let defaults = StealthSettings::default();
        Self {
            min_delay: defaults.min_delay,
            max_delay: defaults.max_delay,
            current_delay: defaults.min_delay,
            rotate_bounds: (defaults.rotate_min_delay, defaults.rotate_max_delay),
            proxies: Vec::new(),
            current_proxy: None,
            retry_budget: defaults.retry_budget,
            platform: None,
            rng,
        }
    }

    /// Deterministic policy for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Build a policy from configuration. Invalid pool entries are skipped.
    pub fn from_settings(settings: &StealthSettings, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut policy = Self::with_rng(rng);
        policy.retry_budget = settings.retry_budget.max(1);
        policy.rotate_bounds = check_bounds(settings.rotate_min_delay, settings.rotate_max_delay)?;
        let (min, max) = check_bounds(settings.min_delay, settings.max_delay)?;
        policy.min_delay = min;
        policy.max_delay = max;
        policy.current_delay = min;

        for uri in &settings.proxies {
            if let Err(e) = policy.add_proxy(uri) {
                warn!("Skipping configured proxy: {}", e);
            }
        }

        Ok(policy)
    }

    /// Store new delay bounds and sample the next delay from them
    pub fn set_delay(&mut self, min_delay: f64, max_delay: f64) -> Result<f64> {
        let (min, max) = check_bounds(min_delay, max_delay)?;
        self.min_delay = min;
        self.max_delay = max;
        self.current_delay = if min == max {
            min
        } else {
            self.rng.gen_range(min..=max)
        };
        debug!(
            "Scan delay range {:.2}-{:.2}s, current delay {:.2}s",
            min, max, self.current_delay
        );
        Ok(self.current_delay)
    }

    /// Re-sample the delay from the rotation bounds
    pub fn rotate_pattern(&mut self) -> Result<f64> {
        let (min, max) = self.rotate_bounds;
        debug!("Rotating request pattern");
        self.set_delay(min, max)
    }

    /// Currently sampled delay in seconds
    pub fn current_delay(&self) -> f64 {
        self.current_delay
    }

    /// Sleep for the sampled delay; returns early with `Cancelled`
    pub async fn apply_delay(&self, cancel: &CancellationToken) -> Result<()> {
        let delay = Duration::try_from_secs_f64(self.current_delay).map_err(|e| {
            ChainError::Stealth(format!("unusable delay {}s: {}", self.current_delay, e))
        })?;
        debug!("Applying stealth delay: {:.2}s", self.current_delay);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChainError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Check a proxy URI without touching the pool
    pub fn validate_proxy(uri: &str) -> bool {
        ProxyEndpoint::parse(uri).is_some()
    }

    /// Normalize and append a proxy; invalid or duplicate URIs are rejected
    pub fn add_proxy(&mut self, uri: &str) -> Result<ProxyEndpoint> {
        let endpoint = ProxyEndpoint::parse(uri)
            .ok_or_else(|| ChainError::ProxyRejected(format!("invalid proxy URI '{}'", uri)))?;
        let normalized = endpoint.uri();

        if self.proxies.contains(&normalized) {
            return Err(ChainError::ProxyRejected(format!(
                "'{}' is already in the pool",
                normalized
            )));
        }

        info!("Added proxy {}", normalized);
        self.proxies.push(normalized);
        Ok(endpoint)
    }

    /// Pick a random valid proxy, pruning invalid entries along the way.
    /// `None` means no proxy is selected, which is not an error.
    pub fn rotate_proxy(&mut self) -> Option<ProxyEndpoint> {
        for _ in 0..self.retry_budget {
            if self.proxies.is_empty() {
                break;
            }

            let index = self.rng.gen_range(0..self.proxies.len());
            match ProxyEndpoint::parse(&self.proxies[index]) {
                Some(endpoint) => {
                    debug!("Rotated to proxy {}", endpoint);
                    self.current_proxy = Some(endpoint.clone());
                    return Some(endpoint);
                }
                None => {
                    let removed = self.proxies.remove(index);
                    warn!("Removed invalid proxy '{}' from pool", removed);
                }
            }
        }

        self.current_proxy = None;
        None
    }

    pub fn current_proxy(&self) -> Option<&ProxyEndpoint> {
        self.current_proxy.as_ref()
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }

    /// Platform for this session, chosen on first use
    pub fn platform(&mut self) -> Platform {
        match self.platform {
            Some(platform) => platform,
            None => {
                let platform = fingerprint::random_platform(&mut self.rng);
                debug!("Session platform fixed to {}", platform);
                self.platform = Some(platform);
                platform
            }
        }
    }

    /// Browser fingerprint consistent with the session platform
    pub fn fingerprint(&mut self) -> BrowserFingerprint {
        let platform = self.platform();
        fingerprint::generate(platform, &mut self.rng)
    }

    /// Request headers consistent with the session platform
    pub fn build_headers(&mut self) -> HashMap<String, String> {
        let platform = self.platform();
        fingerprint::build_headers(platform, &mut self.rng)
    }

    pub fn snapshot(&self) -> StealthConfig {
        StealthConfig {
            min_delay: self.min_delay,
            max_delay: self.max_delay,
            current_delay: self.current_delay,
            proxies: self.proxies.clone(),
            current_proxy: self.current_proxy.clone(),
            retry_budget: self.retry_budget,
            platform: self.platform,
        }
    }
}

fn check_bounds(min_delay: f64, max_delay: f64) -> Result<(f64, f64)> {
    if !min_delay.is_finite() || !max_delay.is_finite() || min_delay < 0.0 || max_delay < 0.0 {
        return Err(ChainError::Stealth(format!(
            "delay bounds must be finite and non-negative, got {}-{}",
            min_delay, max_delay
        )));
    }
    if min_delay > max_delay {
        return Err(ChainError::Stealth(format!(
            "minimum delay {} exceeds maximum {}",
            min_delay, max_delay
        )));
    }
    if max_delay > MAX_DELAY_SECS {
        return Err(ChainError::Stealth(format!(
            "maximum delay {} exceeds the {}s limit",
            max_delay, MAX_DELAY_SECS
        )));
    }
    Ok((min_delay, max_delay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_delay_samples_within_bounds() {
        let mut policy = StealthPolicy::seeded(1);
        for _ in 0..200 {
            let delay = policy.set_delay(1.0, 3.0).unwrap();
            assert!((1.0..=3.0).contains(&delay));
            assert_eq!(delay, policy.current_delay());
        }
    }

    #[test]
    fn test_set_delay_resamples_each_call() {
        let mut policy = StealthPolicy::seeded(2);
        let samples: Vec<f64> = (0..10).map(|_| policy.set_delay(0.0, 10.0).unwrap()).collect();
        assert!(samples.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_set_delay_rejects_inverted_bounds() {
        let mut policy = StealthPolicy::seeded(3);
        policy.set_delay(0.5, 0.5).unwrap();
        assert!(matches!(policy.set_delay(3.0, 1.0), Err(ChainError::Stealth(_))));
        assert!(policy.set_delay(-1.0, 1.0).is_err());
        assert!(policy.set_delay(0.0, f64::NAN).is_err());
        // Rejected calls leave the previous sample in place
        assert_eq!(policy.current_delay(), 0.5);
    }

    #[test]
    fn test_set_delay_rejects_oversized_bounds() {
        let mut policy = StealthPolicy::seeded(14);
        assert!(matches!(policy.set_delay(1e20, 1e20), Err(ChainError::Stealth(_))));
        assert!(policy.set_delay(0.0, MAX_DELAY_SECS + 1.0).is_err());
        assert!(policy.set_delay(MAX_DELAY_SECS, MAX_DELAY_SECS).is_ok());

        let settings = StealthSettings {
            max_delay: 1e20,
            ..StealthSettings::default()
        };
        assert!(StealthPolicy::from_settings(&settings, Some(1)).is_err());
    }

    #[tokio::test]
    async fn test_apply_delay_unrepresentable_is_an_error() {
        let mut policy = StealthPolicy::seeded(15);
        policy.current_delay = 1e20;
        let result = policy.apply_delay(&CancellationToken::new()).await;
        assert!(matches!(result, Err(ChainError::Stealth(_))));

        policy.current_delay = f64::NAN;
        assert!(policy.apply_delay(&CancellationToken::new()).await.is_err());
    }

    #[test]
    fn test_rotate_pattern_uses_rotation_bounds() {
        let mut policy = StealthPolicy::seeded(4);
        for _ in 0..50 {
            let delay = policy.rotate_pattern().unwrap();
            assert!((0.5..=2.0).contains(&delay));
        }
    }

    #[test]
    fn test_seeded_policies_agree() {
        let mut a = StealthPolicy::seeded(11);
        let mut b = StealthPolicy::seeded(11);
        assert_eq!(a.set_delay(1.0, 3.0).unwrap(), b.set_delay(1.0, 3.0).unwrap());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_validate_proxy() {
        assert!(StealthPolicy::validate_proxy("socks5://10.0.0.1:1080"));
        assert!(StealthPolicy::validate_proxy("10.0.0.1:8080"));
        assert!(!StealthPolicy::validate_proxy("10.0.0.1:70000"));
        assert!(!StealthPolicy::validate_proxy("ftp://host:21"));
    }

    #[test]
    fn test_add_proxy_normalizes_and_dedupes() {
        let mut policy = StealthPolicy::seeded(5);
        let added = policy.add_proxy("10.0.0.1:8080").unwrap();
        assert_eq!(added.uri(), "http://10.0.0.1:8080");

        assert!(matches!(
            policy.add_proxy("http://10.0.0.1:8080"),
            Err(ChainError::ProxyRejected(_))
        ));
        assert!(policy.add_proxy("gopher://10.0.0.1:70").is_err());
        assert_eq!(policy.proxies(), &["http://10.0.0.1:8080".to_string()]);
    }

    #[test]
    fn test_rotate_empty_pool() {
        let mut policy = StealthPolicy::seeded(6);
        assert!(policy.rotate_proxy().is_none());
        assert!(policy.current_proxy().is_none());
    }

    #[test]
    fn test_rotate_prunes_drifted_entries() {
        let mut policy = StealthPolicy::seeded(7);
        policy.proxies.push("not a proxy".to_string());
        policy.add_proxy("socks5://10.0.0.1:1080").unwrap();

        let mut attempts = 0;
        while policy.proxies.len() > 1 && attempts < 64 {
            let selected = policy.rotate_proxy().expect("valid proxy remains in pool");
            assert_eq!(selected.uri(), "socks5://10.0.0.1:1080");
            attempts += 1;
        }

        assert_eq!(policy.proxies(), &["socks5://10.0.0.1:1080".to_string()]);
        assert_eq!(
            policy.current_proxy().map(ProxyEndpoint::uri).as_deref(),
            Some("socks5://10.0.0.1:1080")
        );
    }

    #[test]
    fn test_rotate_pool_exhausted_by_removals() {
        let mut policy = StealthPolicy::seeded(8);
        policy.proxies.push("bogus".to_string());
        policy.proxies.push("also bogus".to_string());

        assert!(policy.rotate_proxy().is_none());
        assert!(policy.proxies().is_empty());
    }

    #[test]
    fn test_fingerprint_platform_is_fixed() {
        let mut policy = StealthPolicy::seeded(9);
        let first = policy.fingerprint();
        for _ in 0..20 {
            let next = policy.fingerprint();
            assert_eq!(next.platform, first.platform);
            assert!(next.user_agent.contains(first.platform.os_marker()));
        }

        let headers = policy.build_headers();
        assert!(headers["User-Agent"].contains(first.platform.os_marker()));
        assert_eq!(policy.snapshot().platform, Some(first.platform));
    }

    #[test]
    fn test_fingerprint_attributes_vary() {
        let mut policy = StealthPolicy::seeded(10);
        let prints: Vec<BrowserFingerprint> = (0..20).map(|_| policy.fingerprint()).collect();
        assert!(prints.windows(2).any(|w| {
            w[0].screen_width != w[1].screen_width
                || w[0].timezone != w[1].timezone
                || w[0].hardware_concurrency != w[1].hardware_concurrency
        }));
    }

    #[test]
    fn test_from_settings_skips_bad_proxies() {
        let settings = StealthSettings {
            proxies: vec![
                "socks5://10.0.0.1:1080".to_string(),
                "10.0.0.1:70000".to_string(),
                "socks5://10.0.0.1:1080".to_string(),
            ],
            ..StealthSettings::default()
        };
        let policy = StealthPolicy::from_settings(&settings, Some(1)).unwrap();
        assert_eq!(policy.proxies(), &["socks5://10.0.0.1:1080".to_string()]);
        assert_eq!(policy.snapshot().retry_budget, 3);
    }

    #[tokio::test]
    async fn test_apply_delay_zero() {
        let mut policy = StealthPolicy::seeded(12);
        policy.set_delay(0.0, 0.0).unwrap();
        let start = std::time::Instant::now();
        policy.apply_delay(&CancellationToken::new()).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_apply_delay_interrupted_by_cancel() {
        let mut policy = StealthPolicy::seeded(13);
        policy.set_delay(30.0, 30.0).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = std::time::Instant::now();
        let result = policy.apply_delay(&cancel).await;
        assert!(matches!(result, Err(ChainError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
