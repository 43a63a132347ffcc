use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::profile::CustomerId;

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "simulator")]
    Simulation,
    #[serde(rename = "whatsapp")]
    MessagingBridge,
    #[serde(rename = "helpdesk")]
    Support,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulation => "simulator",
            Self::MessagingBridge => "whatsapp",
            Self::Support => "helpdesk",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "simulator" => Some(Self::Simulation),
            "whatsapp" => Some(Self::MessagingBridge),
            "helpdesk" => Some(Self::Support),
            _ => None,
        }
    }

    fn turn_prefix(&self) -> &'static str {
        match self {
            Self::Simulation => "sim",
            Self::MessagingBridge => "wa",
            Self::Support => "helpdesk",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub String);

impl TurnId {
    pub fn generate(channel: Channel, role: Role) -> Self {
        Self(format!("{}-{}_{}", channel.turn_prefix(), role.as_str(), Uuid::new_v4()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub type TurnMetadata = Map<String, Value>;

/// One stored message. Turns are append-only: corrections are new turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub customer_id: CustomerId,
    pub channel: Channel,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: TurnMetadata,
}

impl ConversationTurn {
    pub fn new(
        customer_id: CustomerId,
        channel: Channel,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TurnId::generate(channel, role),
            customer_id,
            channel,
            role,
            content: content.into(),
            created_at,
            metadata: TurnMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.metadata.get("conversation_id").and_then(Value::as_str)
    }

    pub fn created_at_iso(&self) -> String {
        format_timestamp(&self.created_at)
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2023-11-14T22:13:20.000Z`.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bounded, oldest-first window over one customer's turns in one channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    /// Builds the window from a store that answers newest-first.
    pub fn from_newest_first(mut turns: Vec<ConversationTurn>) -> Self {
        turns.reverse();
        Self { turns }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
