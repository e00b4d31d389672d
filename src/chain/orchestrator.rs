//! Chain orchestrator
//!
//! The orchestrator holds only its collaborators. Every call to
//! [`ChainOrchestrator::run`] builds its own [`ScanSession`] and
//! [`StealthPolicy`], so one instance can serve any number of runs.

use super::session::ScanSession;
use super::{
    Phase, FTP_ATTEMPT_CHECKPOINT, SSH_ATTEMPT_CHECKPOINT, WEB_SQLI_CHECKPOINT,
    WEB_XSS_CHECKPOINT,
};
use crate::config::ChainConfig;
use crate::discovery::{ServiceCategory, ServiceClassifier};
use crate::network::StealthPolicy;
use crate::output::{LogSink, ProgressEvent, ProgressSink};
use crate::probes::{PayloadRegistry, ProbeKind, ProbeReport, ProbeRequest, ProbeSet};
use crate::utils::target_parser::Target;
use crate::{ChainError, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Prefix of the single-line result of a failed run
pub const CHAIN_ERROR_PREFIX: &str = "Error in security test chain:";
/// Last line of every successful report
pub const REMINDER: &str = "\nReminder: Only test authorized systems!";

const SSH_USERNAMES: [&str; 3] = ["admin", "root", "user"];
const WEB_IMPLICIT_PORTS: [u16; 2] = [80, 443];
const SSH_IMPLICIT_PORTS: [u16; 1] = [22];
const COMPLETED: &str = "Chained security test completed";

const RECOMMENDATIONS: [&str; 6] = [
    "1. Minimize exposed services",
    "2. Implement strong access controls",
    "3. Keep all services updated",
    "4. Monitor for suspicious activity",
    "5. Use WAF for web services",
    "6. Enable fail2ban for SSH and FTP",
];

/// Session plus the fault that stopped it, if any
#[derive(Debug)]
pub struct ChainOutcome {
    pub session: ScanSession,
    pub error: Option<ChainError>,
}

impl ChainOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Full report on success, the single error line otherwise
    pub fn report(&self) -> String {
        match &self.error {
            None => self.session.report(),
            Some(e) => format!("{} {}", CHAIN_ERROR_PREFIX, e),
        }
    }

    /// Whatever was accumulated, with the error line appended on failure
    pub fn partial_report(&self) -> String {
        match &self.error {
            None => self.session.report(),
            Some(e) => format!("{}\n{} {}", self.session.report(), CHAIN_ERROR_PREFIX, e),
        }
    }
}

/// Sequences the five test phases against one target
pub struct ChainOrchestrator {
    probes: ProbeSet,
    sink: Arc<dyn ProgressSink>,
    config: ChainConfig,
    classifier: ServiceClassifier,
    payloads: PayloadRegistry,
}

impl ChainOrchestrator {
    pub fn new(probes: ProbeSet, sink: Arc<dyn ProgressSink>, config: ChainConfig) -> Self {
        let payloads = config.payloads.registry();
        Self {
            probes,
            sink,
            config,
            classifier: ServiceClassifier::new(),
            payloads,
        }
    }

    /// Orchestrator wired with the built-in probes and a log sink
    pub fn builtin(config: ChainConfig) -> Self {
        let probes = ProbeSet::builtin(&config);
        Self::new(probes, Arc::new(LogSink), config)
    }

    /// Replace the custom payloads built from configuration
    pub fn with_payloads(mut self, payloads: PayloadRegistry) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn payloads(&self) -> &PayloadRegistry {
        &self.payloads
    }

    /// Run the chain and return the report text.
    ///
    /// Input problems come back as `Error: ...` without any probe call. A
    /// fault during the phases yields only the `Error in security test
    /// chain: ...` line; use [`Self::run_with_outcome`] to keep partial output.
    pub async fn run(&self, target: &str, stealth: bool, cancel: &CancellationToken) -> String {
        let target = match Target::parse(target) {
            Ok(target) => target,
            Err(ChainError::Validation(msg)) => return format!("Error: {}", msg),
            Err(e) => return format!("Error: {}", e),
        };

        self.run_with_outcome(target, stealth, cancel).await.report()
    }

    /// Run the chain and return the session along with any fault
    pub async fn run_with_outcome(
        &self,
        target: Target,
        stealth: bool,
        cancel: &CancellationToken,
    ) -> ChainOutcome {
        let mut session = ScanSession::new(target, stealth);
        self.emit(&mut session, "Initializing chained security test", Some(Phase::Start.checkpoint()));

        match self.execute(&mut session, cancel).await {
            Ok(()) => {
                self.emit(&mut session, COMPLETED, Some(Phase::Done.checkpoint()));
                self.publish(&ProgressEvent::ScanComplete {
                    message: COMPLETED.to_string(),
                });
                info!("Chain against {} finished", session.target());
                ChainOutcome {
                    session,
                    error: None,
                }
            }
            Err(e) => {
                let message = format!("{} {}", CHAIN_ERROR_PREFIX, e);
                error!("{}", message);
                self.emit(&mut session, &message, None);
                ChainOutcome {
                    session,
                    error: Some(e),
                }
            }
        }
    }

    async fn execute(&self, session: &mut ScanSession, cancel: &CancellationToken) -> Result<()> {
        let mut stealth = StealthPolicy::from_settings(&self.config.stealth, self.config.seed)?;

        self.discover(session, &mut stealth, cancel).await?;
        check_cancelled(cancel)?;
        self.test_web(session, &mut stealth, cancel).await?;
        check_cancelled(cancel)?;
        self.test_ssh(session, &mut stealth, cancel).await?;
        check_cancelled(cancel)?;
        self.test_ftp(session, &mut stealth, cancel).await?;
        check_cancelled(cancel)?;
        self.summarize(session);
        Ok(())
    }

    async fn discover(
        &self,
        session: &mut ScanSession,
        stealth: &mut StealthPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let target = session.target().clone();
        self.emit(
            session,
            &format!("\n{} on {}", Phase::Discovery, target),
            Some(Phase::Discovery.checkpoint()),
        );
        session.extend([
            format!("Chained Security Test on {}", target),
            "=".repeat(50),
            format!("\n{}", Phase::Discovery),
            "-".repeat(40),
        ]);

        if session.stealth() {
            let settings = &self.config.stealth;
            let delay = stealth.set_delay(settings.min_delay, settings.max_delay)?;
            self.emit(session, "Stealth mode enabled - Using random delays", None);
            self.emit(session, &format!("Current delay set to: {:.2}s", delay), None);
        }

        let mut request = ProbeRequest::new(target.to_string(), target.host());
        if let Some(port) = target.port() {
            request = request.with_port(port);
        }
        let report = self.invoke(ProbeKind::Discovery, request, cancel).await?;

        let catalog = self.classifier.classify(&report.text);
        info!(
            "Discovered {} service entries on {} ({} web, {} ssh, {} ftp, {} db, {} other)",
            catalog.total(),
            target,
            catalog.len(ServiceCategory::Web),
            catalog.len(ServiceCategory::Ssh),
            catalog.len(ServiceCategory::Ftp),
            catalog.len(ServiceCategory::Db),
            catalog.len(ServiceCategory::Other),
        );
        session.set_catalog(catalog);
        session.extend([report.text, String::new()]);
        Ok(())
    }

    async fn test_web(
        &self,
        session: &mut ScanSession,
        stealth: &mut StealthPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.enter_phase(session, Phase::WebTest);

        let ports = session.catalog().ports(ServiceCategory::Web).to_vec();
        if ports.is_empty() {
            session.push("No web services discovered to test");
            return Ok(());
        }

        for port in ports {
            check_cancelled(cancel)?;
            let target = session.target().clone();
            let endpoint = target.endpoint(port, &WEB_IMPLICIT_PORTS);

            let mut request = ProbeRequest::new(endpoint.clone(), target.host()).with_port(port);
            if session.stealth() {
                request = request
                    .with_headers(stealth.build_headers())
                    .with_proxy(stealth.rotate_proxy());
            }

            self.emit(
                session,
                &format!("Testing SQL injection on {}", endpoint),
                Some(WEB_SQLI_CHECKPOINT),
            );
            let report = self
                .invoke(ProbeKind::SqlInjection, request.clone(), cancel)
                .await?;
            session.extend([report.text, String::new()]);
            self.pace(session, stealth, cancel).await?;

            self.emit(
                session,
                &format!("Testing XSS on {}", endpoint),
                Some(WEB_XSS_CHECKPOINT),
            );
            let report = self
                .invoke(ProbeKind::CrossSiteScripting, request, cancel)
                .await?;
            session.extend([report.text, String::new()]);
            self.pace(session, stealth, cancel).await?;
        }

        Ok(())
    }

    async fn test_ssh(
        &self,
        session: &mut ScanSession,
        stealth: &mut StealthPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.enter_phase(session, Phase::SshTest);

        let ports = session.catalog().ports(ServiceCategory::Ssh).to_vec();
        if ports.is_empty() {
            session.push("No SSH services discovered to test");
            return Ok(());
        }

        for port in ports {
            let target = session.target().clone();
            let endpoint = target.endpoint(port, &SSH_IMPLICIT_PORTS);

            for username in SSH_USERNAMES {
                check_cancelled(cancel)?;
                self.emit(
                    session,
                    &format!("Testing SSH auth on {} with username: {}", endpoint, username),
                    Some(SSH_ATTEMPT_CHECKPOINT),
                );

                let request = ProbeRequest::new(endpoint.clone(), target.host())
                    .with_port(port)
                    .with_username(username);
                let report = self.invoke(ProbeKind::SshCredential, request, cancel).await?;
                let found = report.success;
                session.extend([report.text, String::new()]);

                if found {
                    warn!("Weak SSH credentials accepted on {} for {}", endpoint, username);
                    break;
                }
                self.pace(session, stealth, cancel).await?;
            }
        }

        Ok(())
    }

    async fn test_ftp(
        &self,
        session: &mut ScanSession,
        stealth: &mut StealthPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.enter_phase(session, Phase::FtpTest);

        let ports = session.catalog().ports(ServiceCategory::Ftp).to_vec();
        if ports.is_empty() {
            session.push("No FTP services discovered to test");
            return Ok(());
        }

        for port in ports {
            check_cancelled(cancel)?;
            let host = session.target().host().to_string();
            self.emit(
                session,
                &format!("Testing FTP auth on {}:{}", host, port),
                Some(FTP_ATTEMPT_CHECKPOINT),
            );

            let request = ProbeRequest::new(host.clone(), host).with_port(port);
            let report = self.invoke(ProbeKind::FtpCredential, request, cancel).await?;
            session.extend([report.text, String::new()]);
            self.pace(session, stealth, cancel).await?;
        }

        Ok(())
    }

    fn summarize(&self, session: &mut ScanSession) {
        self.emit(
            session,
            &format!("\n{}", Phase::Summary),
            Some(Phase::Summary.checkpoint()),
        );

        let catalog = session.catalog().clone();
        session.extend([
            "\nSecurity Analysis".to_string(),
            "=".repeat(50),
            format!("Web Services: {} ports", catalog.len(ServiceCategory::Web)),
            format!("SSH Services: {} ports", catalog.len(ServiceCategory::Ssh)),
            format!("FTP Services: {} ports", catalog.len(ServiceCategory::Ftp)),
            format!("Database Services: {} ports", catalog.len(ServiceCategory::Db)),
            format!("Other Services: {} ports", catalog.len(ServiceCategory::Other)),
            "\nRecommendations:".to_string(),
        ]);
        session.extend(RECOMMENDATIONS);
        session.push(REMINDER);
    }

    fn enter_phase(&self, session: &mut ScanSession, phase: Phase) {
        self.emit(session, &format!("\n{}", phase), Some(phase.checkpoint()));
        session.extend([format!("\n{}", phase), "-".repeat(40)]);
    }

    async fn invoke(
        &self,
        kind: ProbeKind,
        request: ProbeRequest,
        cancel: &CancellationToken,
    ) -> Result<ProbeReport> {
        let request = match kind.payload_kind() {
            Some(family) => request.with_payloads(self.payloads.get(family)),
            None => request,
        };
        let probe = self.probes.get(kind);
        debug!(
            "Invoking {} probe '{}' against {} with {} custom payloads",
            kind,
            probe.name(),
            request.target,
            request.payloads.len()
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChainError::Cancelled),
            report = probe.probe(&request) => report,
        };
        if let Err(e) = &result {
            if e.is_probe_fault() {
                warn!("Probe '{}' failed against {}: {}", probe.name(), request.target, e);
            }
        }
        result
    }

    async fn pace(
        &self,
        session: &mut ScanSession,
        stealth: &StealthPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !session.stealth() {
            return Ok(());
        }
        self.emit(
            session,
            &format!("Applying stealth delay: {:.2}s", stealth.current_delay()),
            None,
        );
        stealth.apply_delay(cancel).await
    }

    fn emit(&self, session: &mut ScanSession, message: &str, progress: Option<u8>) {
        self.publish(&ProgressEvent::log(message));
        if let Some(percent) = progress {
            let progress = session.advance(percent);
            self.publish(&ProgressEvent::ChainProgress { progress });
        }
    }

    fn publish(&self, event: &ProgressEvent) {
        if let Err(e) = self.sink.publish(event) {
            warn!("Dropped {} event: {}", event.name(), e);
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ChainError::Cancelled)
    } else {
        Ok(())
    }
}
