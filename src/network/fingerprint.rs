//! Simulated browser identity for paced web probes
//!
//! The platform family is fixed per session by [`super::stealth::StealthPolicy`];
//! everything here is a pure function of the platform and a random source.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Operating system family a session pretends to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Windows, Platform::MacOs, Platform::Linux];

    /// User agents consistent with this platform
    pub fn user_agents(&self) -> &'static [&'static str] {
        match self {
            Platform::Windows => &[
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
            ],
            Platform::MacOs => &[
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
            ],
            Platform::Linux => &[
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
                "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
            ],
        }
    }

    /// Marker every user agent of this platform contains
    pub fn os_marker(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows NT",
            Platform::MacOs => "Macintosh",
            Platform::Linux => "Linux",
        }
    }

    /// Value for the `Sec-CH-UA-Platform` client hint
    pub fn client_hint(&self) -> &'static str {
        match self {
            Platform::Windows => "\"Windows\"",
            Platform::MacOs => "\"macOS\"",
            Platform::Linux => "\"Linux\"",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
        };
        f.write_str(name)
    }
}

const SCREEN_RESOLUTIONS: [(u32, u32); 6] = [
    (1920, 1080),
    (2560, 1440),
    (1366, 768),
    (1536, 864),
    (1440, 900),
    (3840, 2160),
];
const COLOR_DEPTHS: [u8; 3] = [24, 30, 32];
const TIMEZONES: [&str; 6] = [
    "America/New_York",
    "America/Los_Angeles",
    "Europe/London",
    "Europe/Berlin",
    "Asia/Tokyo",
    "Australia/Sydney",
];
const CORE_COUNTS: [u8; 6] = [2, 4, 6, 8, 12, 16];

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";
const ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// One snapshot of the simulated browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserFingerprint {
    pub platform: Platform,
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u8,
    pub timezone: String,
    pub hardware_concurrency: u8,
}

fn pick<T: Copy, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> T {
    items[rng.gen_range(0..items.len())]
}

/// Pick a platform uniformly at random
pub fn random_platform<R: Rng + ?Sized>(rng: &mut R) -> Platform {
    pick(&Platform::ALL, rng)
}

/// Pick a user agent belonging to `platform`
pub fn random_user_agent<R: Rng + ?Sized>(platform: Platform, rng: &mut R) -> &'static str {
    pick(platform.user_agents(), rng)
}

/// Generate a fingerprint for `platform`; screen, timezone and cores vary per call
pub fn generate<R: Rng + ?Sized>(platform: Platform, rng: &mut R) -> BrowserFingerprint {
    let (screen_width, screen_height) = pick(&SCREEN_RESOLUTIONS, rng);
    BrowserFingerprint {
        platform,
        user_agent: random_user_agent(platform, rng).to_string(),
        screen_width,
        screen_height,
        color_depth: pick(&COLOR_DEPTHS, rng),
        timezone: pick(&TIMEZONES, rng).to_string(),
        hardware_concurrency: pick(&CORE_COUNTS, rng),
    }
}

/// Request headers for `platform`. Client hints are included at random.
pub fn build_headers<R: Rng + ?Sized>(platform: Platform, rng: &mut R) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(
        "User-Agent".to_string(),
        random_user_agent(platform, rng).to_string(),
    );
    headers.insert("Accept".to_string(), ACCEPT.to_string());
    headers.insert("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string());
    headers.insert("Accept-Encoding".to_string(), ACCEPT_ENCODING.to_string());
    headers.insert("Connection".to_string(), "close".to_string());

    if rng.gen_bool(0.5) {
        headers.insert(
            "Sec-CH-UA-Platform".to_string(),
            platform.client_hint().to_string(),
        );
    }
    if rng.gen_bool(0.5) {
        headers.insert("Sec-CH-UA-Mobile".to_string(), "?0".to_string());
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_user_agents_match_platform() {
        for platform in Platform::ALL {
            for agent in platform.user_agents() {
                assert!(agent.contains(platform.os_marker()), "{} vs {}", agent, platform);
            }
        }
    }

    #[test]
    fn test_generate_is_deterministic_for_seed() {
        let a = generate(Platform::Linux, &mut StdRng::seed_from_u64(42));
        let b = generate(Platform::Linux, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert!(a.user_agent.contains("Linux"));
        assert!(COLOR_DEPTHS.contains(&a.color_depth));
        assert!(CORE_COUNTS.contains(&a.hardware_concurrency));
    }

    #[test]
    fn test_headers_contain_required_fields() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let headers = build_headers(Platform::Windows, &mut rng);
            assert!(headers["User-Agent"].contains("Windows NT"));
            assert_eq!(headers["Accept"], ACCEPT);
            assert_eq!(headers["Accept-Language"], ACCEPT_LANGUAGE);
            assert_eq!(headers["Connection"], "close");
            if let Some(hint) = headers.get("Sec-CH-UA-Platform") {
                assert_eq!(hint, "\"Windows\"");
            }
        }
    }

    #[test]
    fn test_optional_headers_vary() {
        let mut rng = StdRng::seed_from_u64(99);
        let with_hint = (0..64)
            .filter(|_| build_headers(Platform::MacOs, &mut rng).contains_key("Sec-CH-UA-Platform"))
            .count();
        assert!(with_hint > 0 && with_hint < 64);
    }
}
