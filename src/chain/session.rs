//! Per-run scan state

use crate::discovery::ServiceCatalog;
use crate::utils::target_parser::Target;

/// State of one chain run. Created by the orchestrator at the start of a run
/// and handed back to the caller at the end; never shared between runs.
#[derive(Debug, Clone)]
pub struct ScanSession {
    target: Target,
    stealth: bool,
    lines: Vec<String>,
    progress: u8,
    catalog: ServiceCatalog,
}

impl ScanSession {
    pub fn new(target: Target, stealth: bool) -> Self {
        Self {
            target,
            stealth,
            lines: Vec::new(),
            progress: 0,
            catalog: ServiceCatalog::new(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn stealth(&self) -> bool {
        self.stealth
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn extend<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines.extend(lines.into_iter().map(Into::into));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Move progress to `percent`, never backwards and never past 100.
    /// Returns the effective value.
    pub fn advance(&mut self, percent: u8) -> u8 {
        self.progress = self.progress.max(percent.min(100));
        self.progress
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub(crate) fn set_catalog(&mut self, catalog: ServiceCatalog) {
        self.catalog = catalog;
    }

    /// Accumulated report lines joined with newlines
    pub fn report(&self) -> String {
        self.lines.join("\n")
    }
}
