//! Slack incoming-webhook alerts
//!
//! Info and error notifications as a single attachment message, colored by
//! level. Pages are posted too, so the channel has the full history even when
//! PagerDuty is not configured.
//!
//! Created: 2026-10-05

use super::{AlertSink, Fields, Severity};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

const COLOR_INFO: &str = "#2eb886";
const COLOR_WARNING: &str = "#ecb22e";
const COLOR_ERROR: &str = "#e01e5a";
const COLOR_PAGE: &str = "#8b0000";

/// Slack webhook message structure
#[derive(Debug, Serialize)]
struct SlackMessage {
    text: String,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: &'static str,
    title: String,
    fields: Vec<SlackField>,
    footer: String,
    ts: i64,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

pub struct SlackAlerter {
    webhook_url: String,
    app_name: String,
    client: reqwest::Client,
}

impl SlackAlerter {
    pub fn new(webhook_url: String, app_name: String) -> Self {
        Self {
            webhook_url,
            app_name,
            client: reqwest::Client::new(),
        }
    }

    fn message(&self, color: &'static str, title: &str, fields: &Fields) -> SlackMessage {
        SlackMessage {
            text: format!("[{}] {}", self.app_name, title),
            attachments: vec![SlackAttachment {
                color,
                title: title.to_string(),
                fields: fields
                    .iter()
                    .map(|(name, value)| SlackField {
                        title: name.clone(),
                        // long values (owner lists, reasons) get a full row
                        short: value.len() <= 40,
                        value: value.clone(),
                    })
                    .collect(),
                footer: self.app_name.clone(),
                ts: chrono::Utc::now().timestamp(),
            }],
        }
    }

    async fn post(&self, message: &SlackMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await
            .context("Failed to reach Slack webhook")?;

        if !response.status().is_success() {
            bail!("Slack webhook returned status: {}", response.status());
        }
        debug!("Slack alert sent: {}", message.text);
        Ok(())
    }
}

#[async_trait]
impl AlertSink for SlackAlerter {
    async fn notify_info(&self, title: &str, fields: &Fields) -> Result<()> {
        self.post(&self.message(COLOR_INFO, title, fields)).await
    }

    async fn notify_warning(&self, title: &str, fields: &Fields) -> Result<()> {
        self.post(&self.message(COLOR_WARNING, title, fields)).await
    }

    async fn notify_error(&self, title: &str, fields: &Fields) -> Result<()> {
        self.post(&self.message(COLOR_ERROR, title, fields)).await
    }

    async fn page(&self, summary: &str, severity: Severity, details: &Fields) -> Result<()> {
        let title = format!("PAGE ({}): {}", severity, summary);
        self.post(&self.message(COLOR_PAGE, &title, details)).await
    }
}
