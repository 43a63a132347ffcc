//! Escalation notices to human operators.
//!
//! Every configured channel receives the notice concurrently. Dispatch
//! settles all channels: one channel failing, or its task panicking, never
//! cancels the others and never fails the caller. Outcomes are returned in
//! channel order.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use concierge_core::config::HelpdeskConfig;
use concierge_core::domain::escalation::EscalationNotice;

use crate::messaging::{MessageSender, OutboundMessage};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification channel misconfigured: {0}")]
    Configuration(String),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notice: &EscalationNotice) -> Result<(), NotificationError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub channel: &'static str,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.delivered).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.delivered)
    }

    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.delivered)
    }
}

pub async fn dispatch_all(
    channels: &[Arc<dyn NotificationChannel>],
    notice: &EscalationNotice,
) -> DispatchReport {
    let mut deliveries = JoinSet::new();
    for (index, channel) in channels.iter().enumerate() {
        let channel = Arc::clone(channel);
        let notice = notice.clone();
        deliveries.spawn(async move { (index, channel.notify(&notice).await) });
    }

    let mut settled: Vec<Option<Result<(), String>>> = vec![None; channels.len()];
    while let Some(joined) = deliveries.join_next().await {
        if let Ok((index, result)) = joined {
            settled[index] = Some(result.map_err(|error| error.to_string()));
        }
    }

    let outcomes = channels
        .iter()
        .zip(settled)
        .map(|(channel, result)| {
            let result = result.unwrap_or_else(|| Err("notification task panicked".to_string()));
            match result {
                Ok(()) => {
                    info!(
                        event_name = "escalation.notify.delivered",
                        customer_id = %notice.customer_id,
                        channel = channel.name(),
                        "escalation notice delivered"
                    );
                    ChannelOutcome { channel: channel.name(), delivered: true, error: None }
                }
                Err(error) => {
                    warn!(
                        event_name = "escalation.notify.failed",
                        customer_id = %notice.customer_id,
                        channel = channel.name(),
                        error = %error,
                        "escalation notice delivery failed"
                    );
                    ChannelOutcome { channel: channel.name(), delivered: false, error: Some(error) }
                }
            }
        })
        .collect();

    DispatchReport { outcomes }
}

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// `None` unless sender, recipient and SMTP url are all configured.
    pub fn from_config(config: &HelpdeskConfig) -> Result<Option<Self>, NotificationError> {
        let (Some(from), Some(to), Some(smtp_url)) =
            (&config.email_from, &config.email_to, &config.smtp_url)
        else {
            return Ok(None);
        };

        let from = parse_mailbox("helpdesk.email_from", from)?;
        let to = parse_mailbox("helpdesk.email_to", to)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(smtp_url.expose_secret())
            .map_err(|error| NotificationError::Configuration(error.to_string()))?
            .build();

        Ok(Some(Self { transport, from, to }))
    }
}

fn parse_mailbox(field: &str, raw: &str) -> Result<Mailbox, NotificationError> {
    raw.parse::<Mailbox>()
        .map_err(|error| NotificationError::Configuration(format!("{field}: {error}")))
}

#[async_trait]
impl NotificationChannel for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, notice: &EscalationNotice) -> Result<(), NotificationError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notice.subject.clone())
            .body(notice.body.clone())
            .map_err(|error| NotificationError::Delivery(error.to_string()))?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|error| NotificationError::Delivery(error.to_string()))
    }
}

/// Sends the notice as a single WhatsApp text to the on-call number.
pub struct WhatsAppNotifier {
    sender: Arc<dyn MessageSender>,
    number: String,
}

impl WhatsAppNotifier {
    pub fn new(sender: Arc<dyn MessageSender>, number: impl Into<String>) -> Self {
        Self { sender, number: number.into() }
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppNotifier {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn notify(&self, notice: &EscalationNotice) -> Result<(), NotificationError> {
        self.sender
            .send_message(OutboundMessage {
                to: self.number.clone(),
                message: notice.as_text(),
                reply_to_message_id: None,
            })
            .await
            .map_err(|error| NotificationError::Delivery(error.to_string()))
    }
}
