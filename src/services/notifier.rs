// src/services/notifier.rs

//! Change alerts: rendering and webhook delivery.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use reqwest::Client;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{
    AlertLabels, Change, FieldKind, FieldValue, Observation, ProductRecord, TrackedField, Variant,
};
use crate::utils::url::display_name;

/// Discord rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 2000;

const FALLBACK_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Outbound channel for rendered alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<()>;
}

/// Everything an alert needs to describe one reconciliation.
#[derive(Debug, Clone)]
pub struct ChangeAlert<'a> {
    pub url: &'a str,
    /// Stored state before this pass; source of the old values
    pub previous: &'a ProductRecord,
    pub current: &'a Observation,
    pub changes: &'a [Change],
    pub detected_at: DateTime<Utc>,
}

impl ChangeAlert<'_> {
    /// Render the alert as a Markdown message.
    pub fn render(&self, labels: &AlertLabels) -> String {
        let mut msg = String::new();

        let _ = writeln!(msg, "{}\n", labels.headline);
        let _ = writeln!(msg, "{} {}", labels.product, display_name(self.url));
        let _ = writeln!(msg, "{} {}\n", labels.url, self.url);

        for (i, variant) in Variant::ALL.into_iter().enumerate() {
            if i > 0 {
                msg.push('\n');
            }
            let title = match variant {
                Variant::Primary => &labels.primary,
                Variant::Secondary => &labels.secondary,
            };
            let _ = writeln!(msg, "{}", title);
            for field in variant.fields() {
                let _ = writeln!(msg, "{}", self.render_field(field, labels));
            }
        }

        let _ = write!(msg, "\n{} {}", labels.date, self.timestamp(labels));

        msg
    }

    /// Local detection time; an unusable label format falls back to the default.
    fn timestamp(&self, labels: &AlertLabels) -> String {
        let local = self.detected_at.with_timezone(&Local);
        let mut stamp = String::new();
        if write!(stamp, "{}", local.format(&labels.date_format)).is_err() {
            log::warn!("Invalid alert date format '{}'", labels.date_format);
            stamp = local.format(FALLBACK_DATE_FORMAT).to_string();
        }
        stamp
    }

    fn render_field(&self, field: TrackedField, labels: &AlertLabels) -> String {
        let name = match field.kind() {
            FieldKind::Price => &labels.price,
            FieldKind::Stock => &labels.stock,
        };

        // Old values come from the stored record, new ones from the observation
        match Change::find(self.changes, field) {
            Some(_) => format!(
                "{} {} → **{}**",
                name,
                value_label(&self.previous.fields.value(field), labels),
                value_label(&self.current.value(field), labels)
            ),
            None => format!(
                "{} {} {}",
                name,
                value_label(&self.current.value(field), labels),
                labels.no_change
            ),
        }
    }
}

/// Display form of a value; stock flags become two-state labels.
fn value_label(value: &FieldValue, labels: &AlertLabels) -> String {
    match value {
        FieldValue::Price(price) => price.clone(),
        FieldValue::Stock(true) => labels.in_stock.clone(),
        FieldValue::Stock(false) => labels.out_of_stock.clone(),
    }
}

/// Cut a message to the channel limit, marking the cut with an ellipsis.
fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    cut.push('…');
    cut
}

/// Discord-compatible webhook channel.
pub struct DiscordWebhook {
    client: Client,
    webhook_url: String,
    timeout: Duration,
}

impl DiscordWebhook {
    pub fn new(client: Client, webhook_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhook {
    async fn deliver(&self, message: &str) -> Result<()> {
        let payload = json!({ "content": truncate_message(message) });

        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::notify(format!("webhook responded with {status}")));
        }

        log::info!("Alert delivered to webhook");
        Ok(())
    }
}

/// Renders alerts and hands them to a channel.
#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    labels: AlertLabels,
}

impl Notifier {
    pub fn new(channel: Arc<dyn NotificationChannel>, labels: AlertLabels) -> Self {
        Self { channel, labels }
    }

    pub async fn notify(&self, alert: &ChangeAlert<'_>) -> Result<()> {
        let message = alert.render(&self.labels);
        self.channel.deliver(&message).await
    }
}
