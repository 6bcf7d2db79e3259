//! PagerDuty Events API v2
//!
//! Only `page` reaches PagerDuty. Info, warning and error notifications are
//! not incidents and are accepted as no-ops.
//!
//! Created: 2026-10-05

use super::{AlertSink, Fields, Severity};
use crate::error::truncate_chars;
use alloy::primitives::{hex, keccak256};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

const EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";
/// Events v2 rejects longer summaries
const MAX_SUMMARY_LEN: usize = 1024;
/// Events v2 rejects longer dedup keys
const MAX_DEDUP_KEY_LEN: usize = 255;

#[derive(Debug, Serialize)]
struct PagerDutyEvent<'a> {
    routing_key: &'a str,
    event_action: &'static str,
    dedup_key: String,
    payload: PagerDutyPayload<'a>,
}

#[derive(Debug, Serialize)]
struct PagerDutyPayload<'a> {
    summary: String,
    source: &'a str,
    severity: Severity,
    timestamp: String,
    custom_details: BTreeMap<&'a str, &'a str>,
}

/// Short stable fingerprint of a page summary
fn summary_digest(summary: &str) -> String {
    hex::encode(&keccak256(summary.as_bytes())[..8])
}

pub struct PagerDutyAlerter {
    routing_key: String,
    source: String,
    endpoint: String,
    client: reqwest::Client,
}

impl PagerDutyAlerter {
    pub fn new(routing_key: String, source: String) -> Self {
        Self {
            routing_key,
            source,
            endpoint: EVENTS_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn event<'a>(
        &'a self,
        summary: &str,
        severity: Severity,
        details: &'a Fields,
    ) -> PagerDutyEvent<'a> {
        let now = chrono::Utc::now();
        PagerDutyEvent {
            routing_key: &self.routing_key,
            event_action: "trigger",
            // one incident per summary per day
            dedup_key: truncate_chars(
                format!("{}-{}-{}", self.source, now.format("%Y%m%d"), summary_digest(summary)),
                MAX_DEDUP_KEY_LEN,
            ),
            payload: PagerDutyPayload {
                summary: truncate_chars(format!("[{}] {}", self.source, summary), MAX_SUMMARY_LEN),
                source: &self.source,
                severity,
                timestamp: now.to_rfc3339(),
                custom_details: details.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect(),
            },
        }
    }
}

#[async_trait]
impl AlertSink for PagerDutyAlerter {
    async fn notify_info(&self, _title: &str, _fields: &Fields) -> Result<()> {
        Ok(())
    }

    async fn notify_warning(&self, _title: &str, _fields: &Fields) -> Result<()> {
        Ok(())
    }

    async fn notify_error(&self, _title: &str, _fields: &Fields) -> Result<()> {
        Ok(())
    }

    async fn page(&self, summary: &str, severity: Severity, details: &Fields) -> Result<()> {
        let event = self.event(summary, severity, details);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&event)
            .send()
            .await
            .context("Failed to reach PagerDuty")?;

        if !response.status().is_success() {
            bail!("PagerDuty returned status: {}", response.status());
        }
        info!("PagerDuty {} page sent: {}", severity, summary);
        Ok(())
    }
}
