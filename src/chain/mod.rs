//! Phased attack-chain pipeline
//!
//! A run walks the phases below strictly in order. Each phase is bound to a
//! fixed progress checkpoint:
//!
//! | Phase       | Checkpoint |
//! |-------------|------------|
//! | start       | 0          |
//! | discovery   | 10         |
//! | web test    | 30 → 40/60 |
//! | ssh test    | 50 → 70    |
//! | ftp test    | 70 → 80    |
//! | summary     | 90         |
//! | done        | 100        |

pub mod orchestrator;
pub mod session;

pub use orchestrator::{ChainOrchestrator, ChainOutcome, CHAIN_ERROR_PREFIX, REMINDER};
pub use session::ScanSession;

use std::fmt;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Start,
    Discovery,
    WebTest,
    SshTest,
    FtpTest,
    Summary,
    Done,
}

impl Phase {
    /// Progress emitted on phase entry
    pub fn checkpoint(self) -> u8 {
        match self {
            Phase::Start => 0,
            Phase::Discovery => 10,
            Phase::WebTest => 30,
            Phase::SshTest => 50,
            Phase::FtpTest => 70,
            Phase::Summary => 90,
            Phase::Done => 100,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            Phase::Start => "Start",
            Phase::Discovery => "Phase 1: Service Discovery",
            Phase::WebTest => "Phase 2: Web Vulnerability Testing",
            Phase::SshTest => "Phase 3: SSH Security Testing",
            Phase::FtpTest => "Phase 4: FTP Security Testing",
            Phase::Summary => "Phase 5: Security Analysis",
            Phase::Done => "Done",
        };
        f.write_str(title)
    }
}

/// Progress after each SQL injection probe call
pub const WEB_SQLI_CHECKPOINT: u8 = 40;
/// Progress after each XSS probe call
pub const WEB_XSS_CHECKPOINT: u8 = 60;
/// Progress for each SSH credential attempt
pub const SSH_ATTEMPT_CHECKPOINT: u8 = 70;
/// Progress for each FTP credential run
pub const FTP_ATTEMPT_CHECKPOINT: u8 = 80;
