//! Input validation for the workflow entry points.
//!
//! Transport layers deserialize loosely-typed requests; each request has a
//! `validate` function that either yields the typed input the workflow runs
//! on or a [`ValidationError`] listing every offending field.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::conversation::ConversationId;
use crate::domain::escalation::OriginChannel;
use crate::domain::profile::{CustomerId, CustomerProfile, FaqEntry};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
#[error("invalid input: {}", render_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self { issues: vec![FieldIssue { field, message: message.into() }] }
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

fn render_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Default)]
struct Collector {
    issues: Vec<FieldIssue>,
}

impl Collector {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.issues.push(FieldIssue { field, message: message.into() });
    }

    fn required_text(&mut self, field: &'static str, value: Option<String>) -> String {
        match value {
            Some(value) if !value.trim().is_empty() => value,
            Some(_) => {
                self.push(field, "must not be empty");
                String::new()
            }
            None => {
                self.push(field, "is required");
                String::new()
            }
        }
    }

    fn uuid(&mut self, field: &'static str, value: Option<String>) -> String {
        let value = self.required_text(field, value);
        if value.is_empty() {
            return value;
        }
        let trimmed = value.trim().to_string();
        if Uuid::parse_str(&trimmed).is_err() {
            self.push(field, "must be a UUID");
        }
        trimmed
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError { issues: self.issues })
        }
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub customer_id: Option<String>,
    pub message: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationInput {
    pub customer_id: CustomerId,
    pub message: String,
    pub conversation_id: ConversationId,
}

impl SimulationRequest {
    pub fn validate(self) -> Result<SimulationInput, ValidationError> {
        let mut collector = Collector::default();
        let customer_id = collector.uuid("customerId", self.customer_id);
        let message = collector.required_text("message", self.message);
        let conversation_id = collector.uuid("conversationId", self.conversation_id);

        collector.finish(SimulationInput {
            customer_id: CustomerId(customer_id),
            message,
            conversation_id: ConversationId(conversation_id),
        })
    }
}

/// Inbound message event posted by the messaging instance.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub instance_id: Option<String>,
    pub message_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<i64>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BridgeInput {
    pub instance_id: String,
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl BridgeInput {
    /// Customer from `metadata.customerId`, otherwise the recipient address.
    pub fn customer_id(&self) -> CustomerId {
        let from_metadata = self
            .metadata
            .get("customerId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        CustomerId(from_metadata.unwrap_or(&self.to).to_string())
    }

    /// Conversation from `metadata.conversationId`, otherwise a fresh one.
    pub fn conversation_id(&self) -> ConversationId {
        self.metadata
            .get("conversationId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| ConversationId(value.to_string()))
            .unwrap_or_else(ConversationId::generate)
    }
}

impl WebhookPayload {
    pub fn validate(self) -> Result<BridgeInput, ValidationError> {
        let mut collector = Collector::default();
        let instance_id = collector.required_text("instanceId", self.instance_id);
        let message_id = collector.required_text("messageId", self.message_id);
        let from = collector.required_text("from", self.from);
        let to = collector.required_text("to", self.to);
        let text = collector.required_text("text", self.text);

        let sent_at = match self.timestamp {
            Some(seconds) => match Utc.timestamp_opt(seconds, 0).single() {
                Some(sent_at) => sent_at,
                None => {
                    collector.push("timestamp", "is out of range");
                    DateTime::<Utc>::default()
                }
            },
            None => {
                collector.push("timestamp", "is required");
                DateTime::<Utc>::default()
            }
        };

        collector.finish(BridgeInput {
            instance_id,
            message_id,
            from,
            to,
            text,
            sent_at,
            metadata: self.metadata.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportRequest {
    pub customer_id: Option<String>,
    pub message: Option<String>,
    pub requester: Option<String>,
    pub channel: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupportInput {
    pub customer_id: CustomerId,
    pub message: String,
    pub requester: Option<String>,
    pub origin: OriginChannel,
}

impl SupportRequest {
    pub fn validate(self) -> Result<SupportInput, ValidationError> {
        let mut collector = Collector::default();
        let customer_id = collector.uuid("customerId", self.customer_id);
        let message = collector.required_text("message", self.message);
        let origin = match optional_text(self.channel) {
            None => OriginChannel::default(),
            Some(raw) => OriginChannel::parse(&raw).unwrap_or_else(|| {
                collector.push("channel", "must be one of web|whatsapp|email");
                OriginChannel::default()
            }),
        };

        collector.finish(SupportInput {
            customer_id: CustomerId(customer_id),
            message,
            requester: optional_text(self.requester),
            origin,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    pub id: Option<String>,
    pub company_name: Option<String>,
    pub description: Option<String>,
    pub segment: Option<String>,
    pub voice_tone: Option<String>,
    pub opening_hours: Option<String>,
    pub products: Option<Vec<String>>,
    pub faqs: Option<Vec<FaqEntry>>,
    pub whatsapp_number: Option<String>,
}

impl OnboardingForm {
    /// Yields the full profile to store; the completion timestamp is stamped
    /// by the onboarding workflow.
    pub fn validate(self) -> Result<CustomerProfile, ValidationError> {
        let mut collector = Collector::default();
        let id = collector.uuid("id", self.id);
        let company_name = collector.required_text("companyName", self.company_name);

        let faqs = self.faqs.unwrap_or_default();
        if faqs.iter().any(|faq| faq.question.trim().is_empty() || faq.answer.trim().is_empty()) {
            collector.push("faqs", "entries need both a question and an answer");
        }

        collector.finish(CustomerProfile {
            id: CustomerId(id),
            company_name: company_name.trim().to_string(),
            description: optional_text(self.description),
            segment: optional_text(self.segment),
            voice_tone: optional_text(self.voice_tone),
            opening_hours: optional_text(self.opening_hours),
            products: self
                .products
                .unwrap_or_default()
                .into_iter()
                .map(|product| product.trim().to_string())
                .filter(|product| !product.is_empty())
                .collect(),
            faqs,
            whatsapp_number: optional_text(self.whatsapp_number),
            onboarding_completed_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{OnboardingForm, SimulationRequest, SupportRequest, WebhookPayload};
    use crate::domain::escalation::OriginChannel;

    const CUSTOMER: &str = "5b0f7a52-3c1e-4c58-9d8e-1f2a3b4c5d6e";
    const CONVERSATION: &str = "0e6f2c1a-9b7d-4e3f-8a2b-c4d5e6f7a8b9";

    #[test]
    fn simulation_request_accepts_well_formed_input() {
        let input = SimulationRequest {
            customer_id: Some(CUSTOMER.to_string()),
            message: Some("Do you open on Sunday?".to_string()),
            conversation_id: Some(CONVERSATION.to_string()),
        }
        .validate()
        .expect("valid simulation input");

        assert_eq!(input.customer_id.as_str(), CUSTOMER);
        assert_eq!(input.conversation_id.as_str(), CONVERSATION);
    }

    #[test]
    fn simulation_request_reports_every_bad_field() {
        let error = SimulationRequest {
            customer_id: Some("not-a-uuid".to_string()),
            message: Some("   ".to_string()),
            conversation_id: None,
        }
        .validate()
        .expect_err("invalid simulation input");

        assert!(error.mentions("customerId"));
        assert!(error.mentions("message"));
        assert!(error.mentions("conversationId"));
        assert_eq!(error.issues.len(), 3);
    }

    #[test]
    fn webhook_payload_is_decoded_from_camel_case_json() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "instanceId": "inst-1",
            "messageId": "wamid-1",
            "from": "5511999990000",
            "to": "5511888880000",
            "text": "Oi!",
            "timestamp": 1_700_000_000,
            "metadata": { "customerId": CUSTOMER }
        }))
        .expect("payload json");

        let input = payload.validate().expect("valid payload");
        assert_eq!(input.sent_at.timestamp(), 1_700_000_000);
        assert_eq!(input.customer_id().as_str(), CUSTOMER);
    }

    #[test]
    fn webhook_context_falls_back_to_recipient_and_fresh_conversation() {
        let input = WebhookPayload {
            instance_id: Some("inst-1".to_string()),
            message_id: Some("wamid-1".to_string()),
            from: Some("5511999990000".to_string()),
            to: Some("5511888880000".to_string()),
            text: Some("Oi!".to_string()),
            timestamp: Some(1_700_000_000),
            metadata: None,
        }
        .validate()
        .expect("valid payload");

        assert_eq!(input.customer_id().as_str(), "5511888880000");
        assert_ne!(input.conversation_id(), input.conversation_id());
    }

    #[test]
    fn webhook_payload_without_timestamp_is_rejected() {
        let error = WebhookPayload {
            instance_id: Some("inst-1".to_string()),
            message_id: Some("wamid-1".to_string()),
            from: Some("a".to_string()),
            to: Some("b".to_string()),
            text: Some("hello".to_string()),
            timestamp: None,
            metadata: None,
        }
        .validate()
        .expect_err("missing timestamp");

        assert!(error.mentions("timestamp"));
        assert!(error.to_string().contains("timestamp is required"));
    }

    #[test]
    fn support_channel_defaults_to_web() {
        let input = SupportRequest {
            customer_id: Some(CUSTOMER.to_string()),
            message: Some("How do I connect WhatsApp?".to_string()),
            requester: Some("  ".to_string()),
            channel: None,
        }
        .validate()
        .expect("valid support input");

        assert_eq!(input.origin, OriginChannel::Web);
        assert_eq!(input.requester, None);
    }

    #[test]
    fn support_channel_outside_closed_set_is_rejected() {
        let error = SupportRequest {
            customer_id: Some(CUSTOMER.to_string()),
            message: Some("hi".to_string()),
            requester: None,
            channel: Some("fax".to_string()),
        }
        .validate()
        .expect_err("unknown channel");

        assert!(error.mentions("channel"));
    }

    #[test]
    fn onboarding_form_normalizes_optional_fields() {
        let profile = OnboardingForm {
            id: Some(CUSTOMER.to_string()),
            company_name: Some(" Padaria Central ".to_string()),
            voice_tone: Some(String::new()),
            products: Some(vec!["Bread".to_string(), " ".to_string()]),
            ..OnboardingForm::default()
        }
        .validate()
        .expect("valid form");

        assert_eq!(profile.company_name, "Padaria Central");
        assert_eq!(profile.voice_tone, None);
        assert_eq!(profile.products, vec!["Bread".to_string()]);
        assert!(profile.onboarding_completed_at.is_none());
    }

    #[test]
    fn onboarding_form_requires_company_name() {
        let error = OnboardingForm { id: Some(CUSTOMER.to_string()), ..OnboardingForm::default() }
            .validate()
            .expect_err("missing company name");

        assert!(error.mentions("companyName"));
    }
}
