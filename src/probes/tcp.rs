//! Built-in TCP probes
//!
//! Neither probe sends credentials or payloads: discovery is a plain connect
//! scan and the banner probe only records what a service volunteers.

use super::{Probe, ProbeReport, ProbeRequest};
use crate::discovery::service_name_for_port;
use crate::{ChainError, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

const BANNER_LIMIT: usize = 1024;
const DEFAULT_CONCURRENCY: usize = 256;

/// Connect scan that renders `<port>/tcp open <service>` lines
pub struct TcpDiscoveryProbe {
    ports: Vec<u16>,
    timeout: Duration,
    concurrency: usize,
}

impl TcpDiscoveryProbe {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self {
            ports,
            timeout,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cap the number of connects in flight; at least one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn is_open(host: String, port: u16, connect_timeout: Duration) -> bool {
        matches!(
            timeout(connect_timeout, TcpStream::connect((host.as_str(), port))).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl Probe for TcpDiscoveryProbe {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeReport> {
        let ports = match request.port {
            Some(port) => vec![port],
            None => self.ports.clone(),
        };

        if let Err(e) = tokio::net::lookup_host((request.host.as_str(), 0)).await {
            return Ok(ProbeReport::finding(format!(
                "Connection error: could not resolve {}: {}",
                request.host, e
            )));
        }

        debug!(
            "Connect scan of {} over {} ports, {} at a time",
            request.host,
            ports.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for port in ports {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ChainError::Probe(format!("discovery scheduler closed: {}", e)))?;
            let host = request.host.clone();
            let connect_timeout = self.timeout;
            tasks.spawn(async move {
                let _permit = permit;
                (port, Self::is_open(host, port, connect_timeout).await)
            });
        }

        let mut open = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((port, true)) = joined {
                open.push(port);
            }
        }
        open.sort_unstable();
        open.dedup();

        let mut lines = vec![
            format!("Discovery scan for {}", request.host),
            format!("{:<9} {:<5} {}", "PORT", "STATE", "SERVICE"),
        ];
        for port in &open {
            lines.push(format!(
                "{:<9} {:<5} {}",
                format!("{}/tcp", port),
                "open",
                service_name_for_port(*port)
            ));
        }
        lines.push(format!("{} open ports found", open.len()));

        Ok(ProbeReport::finding(lines.join("\n")))
    }

    fn name(&self) -> &str {
        "tcp-discovery"
    }
}

/// Records the greeting a service sends on connect
pub struct BannerProbe {
    label: String,
    name: String,
    timeout: Duration,
}

impl BannerProbe {
    pub fn new(label: &str, timeout: Duration) -> Self {
        Self {
            label: label.to_string(),
            name: format!("{}-banner", label.to_lowercase()),
            timeout,
        }
    }

    /// Web servers stay silent until asked, so send a HEAD with the
    /// request's browser headers
    fn head_request(request: &ProbeRequest) -> String {
        let mut head = format!("HEAD / HTTP/1.1\r\nHost: {}\r\n", request.host);
        let mut headers: Vec<_> = request.headers.iter().collect();
        headers.sort();
        for (name, value) in headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("\r\n");
        head
    }

    async fn grab(&self, request: &ProbeRequest, port: u16) -> std::io::Result<Option<String>> {
        let connect = TcpStream::connect((request.host.as_str(), port));
        let mut stream = match timeout(self.timeout, connect).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("timed out after {}ms", self.timeout.as_millis()),
                ))
            }
        };
        let mut buffer = vec![0u8; BANNER_LIMIT];

        let mut read = match timeout(self.timeout, stream.read(&mut buffer)).await {
            Ok(result) => result?,
            Err(_) => 0,
        };

        if read == 0 && self.label == "Web" {
            stream.write_all(Self::head_request(request).as_bytes()).await?;
            read = match timeout(self.timeout, stream.read(&mut buffer)).await {
                Ok(result) => result?,
                Err(_) => 0,
            };
        }

        if read == 0 {
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&buffer[..read]);
        Ok(text.lines().next().map(|line| line.trim().to_string()))
    }
}

#[async_trait]
impl Probe for BannerProbe {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeReport> {
        let mut lines = vec![
            format!("{} Service Check - {}", self.label, request.target),
            "-".repeat(40),
        ];
        if let Some(username) = &request.username {
            lines.push(format!("Candidate username: {} (not attempted)", username));
        }
        if !request.payloads.is_empty() {
            lines.push(format!(
                "Custom payloads supplied: {} (not sent)",
                request.payloads.len()
            ));
        }
        if let Some(proxy) = &request.proxy {
            debug!("{} connects directly; proxy {} is not used", self.name, proxy);
        }

        let port = match request.port {
            Some(port) => port,
            None => {
                lines.push("Connection error: no service port given".to_string());
                return Ok(ProbeReport::finding(lines.join("\n")));
            }
        };

        match self.grab(request, port).await {
            Ok(Some(banner)) => lines.push(format!("Banner: {}", banner)),
            Ok(None) => lines.push("No banner received".to_string()),
            Err(e) => lines.push(format!("Connection error: {}", e)),
        }

        Ok(ProbeReport::finding(lines.join("\n")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{ServiceCategory, ServiceClassifier};
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_discovery_reports_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = closed_port().await;

        let probe = TcpDiscoveryProbe::new(vec![open, closed], Duration::from_secs(1));
        let report = probe
            .probe(&ProbeRequest::new("127.0.0.1", "127.0.0.1"))
            .await
            .unwrap();

        assert!(report.text.contains(&format!("{}/tcp", open)));
        assert!(!report.text.contains(&format!("{}/tcp", closed)));
        assert!(report.text.contains("1 open ports found"));

        let catalog = ServiceClassifier::new().classify(&report.text);
        assert_eq!(catalog.total(), 1);
        assert_eq!(catalog.ports(ServiceCategory::Other), &[open]);
    }

    #[tokio::test]
    async fn test_discovery_bounded_scan_finds_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();

        let mut ports: Vec<u16> = (1..=3000).collect();
        ports.push(open);

        let probe = TcpDiscoveryProbe::new(ports, Duration::from_millis(500)).with_concurrency(16);
        let report = probe
            .probe(&ProbeRequest::new("127.0.0.1", "127.0.0.1"))
            .await
            .unwrap();

        assert!(report.text.contains(&format!("{}/tcp", open)), "{}", report.text);
    }

    #[test]
    fn test_concurrency_floor() {
        let probe = TcpDiscoveryProbe::new(vec![80], Duration::from_secs(1)).with_concurrency(0);
        assert_eq!(probe.concurrency, 1);
    }

    #[tokio::test]
    async fn test_discovery_honours_explicit_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();

        let probe = TcpDiscoveryProbe::new(vec![], Duration::from_secs(1));
        let report = probe
            .probe(&ProbeRequest::new("127.0.0.1", "127.0.0.1").with_port(open))
            .await
            .unwrap();
        assert!(report.text.contains("1 open ports found"));
    }

    #[tokio::test]
    async fn test_banner_probe_reads_greeting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"SSH-2.0-OpenSSH_9.6\r\n").await;
            }
        });

        let probe = BannerProbe::new("SSH", Duration::from_secs(2));
        let passwords = vec!["Summer2024!".to_string()];
        let request = ProbeRequest::new(format!("127.0.0.1:{}", port), "127.0.0.1")
            .with_port(port)
            .with_username("admin")
            .with_payloads(&passwords);
        let report = probe.probe(&request).await.unwrap();

        assert!(report.text.contains("Banner: SSH-2.0-OpenSSH_9.6"));
        assert!(report.text.contains("Candidate username: admin"));
        assert!(report.text.contains("Custom payloads supplied: 1 (not sent)"));
        assert!(!report.text.contains("Summer2024!"));
        assert!(!report.success);
    }

    #[tokio::test]
    async fn test_banner_probe_sends_head_for_web() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 512];
                if let Ok(n) = socket.read(&mut buf).await {
                    if buf[..n].starts_with(b"HEAD / HTTP/1.1") {
                        let _ = socket.write_all(b"HTTP/1.1 200 OK\r\nServer: test\r\n\r\n").await;
                    }
                }
            }
        });

        let probe = BannerProbe::new("Web", Duration::from_millis(300));
        let request = ProbeRequest::new(format!("127.0.0.1:{}", port), "127.0.0.1").with_port(port);
        let report = probe.probe(&request).await.unwrap();
        assert!(report.text.contains("Banner: HTTP/1.1 200 OK"), "{}", report.text);
    }

    #[tokio::test]
    async fn test_banner_probe_connection_refused_is_a_finding() {
        let port = closed_port().await;
        let probe = BannerProbe::new("FTP", Duration::from_secs(1));
        let request = ProbeRequest::new("127.0.0.1", "127.0.0.1").with_port(port);

        let report = probe.probe(&request).await.unwrap();
        assert!(report.text.contains("Connection error"));
    }

    #[test]
    fn test_head_request_includes_headers() {
        let mut headers = std::collections::HashMap::new();
        headers.insert("User-Agent".to_string(), "Mozilla/5.0 (X11; Linux x86_64)".to_string());
        let request = ProbeRequest::new("example.test", "example.test").with_headers(headers);

        let head = BannerProbe::head_request(&request);
        assert!(head.starts_with("HEAD / HTTP/1.1\r\nHost: example.test\r\n"));
        assert!(head.contains("User-Agent: Mozilla/5.0 (X11; Linux x86_64)\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }
}
