use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::profile::{CustomerId, CustomerProfile};

pub const UNKNOWN_REQUESTER: &str = "unknown";

/// Where a support request was raised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginChannel {
    #[default]
    Web,
    Whatsapp,
    Email,
}

impl OriginChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "web" => Some(Self::Web),
            "whatsapp" | "messaging" => Some(Self::Whatsapp),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

impl std::fmt::Display for OriginChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of reading a support completion. A reply that is not the requested
/// JSON object is kept verbatim as `Raw`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupportReply {
    Structured { response: String, escalate: bool },
    Raw { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EscalationDecision {
    pub response: String,
    pub escalate: bool,
}

#[derive(Deserialize)]
struct StructuredReply {
    response: Option<String>,
    #[serde(default)]
    escalate: Option<Value>,
}

/// Models do not always emit a JSON boolean for the flag; `"true"`, `1` and
/// similar still count as a request to escalate.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

impl SupportReply {
    pub fn parse(completion: &str) -> Self {
        let candidate = strip_code_fence(completion);
        match serde_json::from_str::<StructuredReply>(candidate) {
            Ok(StructuredReply { response: Some(response), escalate })
                if !response.trim().is_empty() =>
            {
                Self::Structured { response, escalate: truthy(escalate.as_ref()) }
            }
            _ => Self::Raw { text: completion.to_string() },
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }

    pub fn into_decision(self) -> EscalationDecision {
        match self {
            Self::Structured { response, escalate } => EscalationDecision { response, escalate },
            Self::Raw { text } => EscalationDecision { response: text, escalate: false },
        }
    }
}

// Models regularly wrap JSON in a ```json fence even when told not to.
fn strip_code_fence(completion: &str) -> &str {
    let trimmed = completion.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Message handed to human operators when a support turn escalates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EscalationNotice {
    pub customer_id: CustomerId,
    pub subject: String,
    pub body: String,
}

impl EscalationNotice {
    pub fn compose(
        profile: &CustomerProfile,
        origin: OriginChannel,
        requester: Option<&str>,
        original_message: &str,
        suggested_response: &str,
    ) -> Self {
        let subject = format!("Helpdesk escalation - {}", profile.company_name);
        let body = [
            format!("Customer: {} ({})", profile.company_name, profile.id),
            format!("Channel: {origin}"),
            format!("Requester: {}", requester.unwrap_or(UNKNOWN_REQUESTER)),
            format!("Original message: {original_message}"),
            format!("Suggested response: {suggested_response}"),
        ]
        .join("\n");

        Self { customer_id: profile.id.clone(), subject, body }
    }

    /// Single-block rendering for channels without a subject line.
    pub fn as_text(&self) -> String {
        format!("{}\n{}", self.subject, self.body)
    }
}
