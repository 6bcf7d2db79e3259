//! Operator alerting
//!
//! `AlertSink` is the narrow interface the pipeline and run loop report
//! through. `Notifier` fans one alert out to every configured sink and
//! swallows (logs) sink failures: an alert that cannot be delivered must never
//! fail a run.
//!
//! Created: 2026-10-05

pub mod pagerduty;
pub mod slack;

pub use pagerduty::PagerDutyAlerter;
pub use slack::SlackAlerter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Page severity, PagerDuty Events v2 vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// Key/value context attached to an alert
pub type Fields = [(String, String)];

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify_info(&self, title: &str, fields: &Fields) -> anyhow::Result<()>;

    async fn notify_warning(&self, title: &str, fields: &Fields) -> anyhow::Result<()>;

    async fn notify_error(&self, title: &str, fields: &Fields) -> anyhow::Result<()>;

    async fn page(&self, summary: &str, severity: Severity, details: &Fields)
        -> anyhow::Result<()>;
}

/// Sink that only writes to the log, used when no webhook is configured
pub struct LogSink;

fn render(fields: &Fields) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl AlertSink for LogSink {
    async fn notify_info(&self, title: &str, fields: &Fields) -> anyhow::Result<()> {
        info!("[alert] {} {}", title, render(fields));
        Ok(())
    }

    async fn notify_warning(&self, title: &str, fields: &Fields) -> anyhow::Result<()> {
        warn!("[alert] {} {}", title, render(fields));
        Ok(())
    }

    async fn notify_error(&self, title: &str, fields: &Fields) -> anyhow::Result<()> {
        error!("[alert] {} {}", title, render(fields));
        Ok(())
    }

    async fn page(&self, summary: &str, severity: Severity, details: &Fields) -> anyhow::Result<()> {
        error!("[page:{}] {} {}", severity, summary, render(details));
        Ok(())
    }
}

/// Fan-out over the configured sinks
#[derive(Clone)]
pub struct Notifier {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        if sinks.is_empty() {
            return Self::log_only();
        }
        Self { sinks }
    }

    pub fn log_only() -> Self {
        Self {
            sinks: vec![Arc::new(LogSink)],
        }
    }

    pub async fn info(&self, title: &str, fields: &Fields) {
        for sink in &self.sinks {
            if let Err(e) = sink.notify_info(title, fields).await {
                warn!("Alert delivery failed ({}): {:#}", title, e);
            }
        }
    }

    pub async fn warn(&self, title: &str, fields: &Fields) {
        for sink in &self.sinks {
            if let Err(e) = sink.notify_warning(title, fields).await {
                warn!("Alert delivery failed ({}): {:#}", title, e);
            }
        }
    }

    pub async fn error(&self, title: &str, fields: &Fields) {
        for sink in &self.sinks {
            if let Err(e) = sink.notify_error(title, fields).await {
                warn!("Alert delivery failed ({}): {:#}", title, e);
            }
        }
    }

    pub async fn page(&self, summary: &str, severity: Severity, details: &Fields) {
        for sink in &self.sinks {
            if let Err(e) = sink.page(summary, severity, details).await {
                error!("Page delivery failed ({}): {:#}", summary, e);
            }
        }
    }
}

/// Build an owned field list from `(name, value)` pairs
pub fn fields<const N: usize>(pairs: [(&str, String); N]) -> Vec<(String, String)> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
