//! Progress events and the sinks that deliver them

use crate::{ChainError, Result};
use chrono::Local;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Point-in-time notification emitted during a chain run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    LogMessage { message: String },
    ChainProgress { progress: u8 },
    ScanComplete { message: String },
}

impl ProgressEvent {
    pub fn log(message: impl Into<String>) -> Self {
        ProgressEvent::LogMessage {
            message: message.into(),
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::LogMessage { .. } => "log_message",
            ProgressEvent::ChainProgress { .. } => "chain_progress",
            ProgressEvent::ScanComplete { .. } => "scan_complete",
        }
    }
}

/// Publish-only progress channel
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: &ProgressEvent) -> Result<()>;
}

/// Forwards events to the `log` facade
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn publish(&self, event: &ProgressEvent) -> Result<()> {
        match event {
            ProgressEvent::LogMessage { message } => log::info!("{}", message.trim()),
            ProgressEvent::ChainProgress { progress } => log::debug!("Chain progress: {}%", progress),
            ProgressEvent::ScanComplete { message } => log::info!("{}", message),
        }
        Ok(())
    }
}

/// Fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastSink {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressSink for BroadcastSink {
    fn publish(&self, event: &ProgressEvent) -> Result<()> {
        self.sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| ChainError::SinkDelivery(format!("no subscribers for {}", event.name())))
    }
}

/// Terminal renderer with a progress bar
pub struct ConsoleSink {
    bar: ProgressBar,
}

impl ConsoleSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}") {
            bar.set_style(style.progress_chars("█░ "));
        }
        Self { bar }
    }

    /// Console sink that draws nothing, for non-interactive use
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn publish(&self, event: &ProgressEvent) -> Result<()> {
        let stamp = Local::now().format("%H:%M:%S").to_string();
        match event {
            ProgressEvent::LogMessage { message } => {
                let message = message.trim();
                let line = if message.starts_with("Error") {
                    message.bright_red().to_string()
                } else if message.starts_with("Phase") {
                    message.bright_cyan().bold().to_string()
                } else {
                    message.to_string()
                };
                self.bar.println(format!("{} {}", format!("[{}]", stamp).bright_blue(), line));
            }
            ProgressEvent::ChainProgress { progress } => {
                self.bar.set_position(u64::from(*progress));
            }
            ProgressEvent::ScanComplete { message } => {
                self.bar.finish_with_message(message.bright_green().to_string());
            }
        }
        Ok(())
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Progress values in emission order
    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::ChainProgress { progress } => Some(progress),
                _ => None,
            })
            .collect()
    }

    /// Log messages in emission order
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::LogMessage { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for MemorySink {
    fn publish(&self, event: &ProgressEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| ChainError::SinkDelivery("event buffer poisoned".to_string()))?;
        events.push(event.clone());
        Ok(())
    }
}
