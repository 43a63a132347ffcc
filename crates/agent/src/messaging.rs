//! Evolution-style WhatsApp instance API: outbound replies, instance status,
//! restart and pairing QR code.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::warn;

use concierge_core::config::MessagingConfig;

const INSTANCE_HEADER: &str = "X-Evolution-Instance";

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("messaging request failed: {0}")]
    Transport(String),
    #[error("messaging API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("messaging response could not be decoded: {0}")]
    Decode(String),
    #[error("messaging is not configured: {0}")]
    NotConfigured(String),
    #[error("invalid outbound message: {0}")]
    InvalidMessage(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub to: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, message: OutboundMessage) -> Result<(), MessagingError>;
}

/// Administrative calls against one messaging instance. Payloads are passed
/// through as the provider returns them.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    async fn instance_status(&self, instance: &str) -> Result<Value, MessagingError>;

    async fn restart_instance(&self, instance: &str) -> Result<Value, MessagingError>;

    async fn instance_qr_code(&self, instance: &str) -> Result<Value, MessagingError>;

    /// Plain text message sent through `instance`, bypassing any workflow.
    async fn send_text(
        &self,
        instance: &str,
        number: &str,
        text: &str,
    ) -> Result<Value, MessagingError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connected,
    Connecting,
    Disconnected,
}

/// Maps a provider state string onto the three states the dashboard shows.
pub fn translate_status(raw: Option<&str>) -> ConnectionState {
    let Some(raw) = raw else {
        return ConnectionState::Disconnected;
    };
    let normalized = raw.trim().to_ascii_uppercase();
    if normalized.contains("DISCONNECTED") {
        return ConnectionState::Disconnected;
    }
    if normalized.contains("CONNECTED") {
        return ConnectionState::Connected;
    }
    match normalized.as_str() {
        "LOADING" | "INITIALIZING" | "QRCODE" | "PAIRING" | "CONNECTING" => {
            ConnectionState::Connecting
        }
        _ => ConnectionState::Disconnected,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatusRecord {
    pub instance: String,
    pub status: ConnectionState,
    pub last_checked_at: DateTime<Utc>,
    pub last_connected_at: Option<String>,
    pub attempting_reconnect: bool,
    pub metadata: Value,
}

impl InstanceStatusRecord {
    fn from_payload(instance: String, payload: Value) -> Self {
        let state = payload.get("state").and_then(Value::as_str);
        let status = translate_status(state);
        Self {
            instance,
            status,
            last_checked_at: Utc::now(),
            last_connected_at: payload
                .get("lastConnectedAt")
                .and_then(Value::as_str)
                .map(str::to_string),
            attempting_reconnect: status != ConnectionState::Connected,
            metadata: payload,
        }
    }

    fn unreachable(instance: String, error: impl std::fmt::Display) -> Self {
        Self {
            instance,
            status: ConnectionState::Disconnected,
            last_checked_at: Utc::now(),
            last_connected_at: None,
            attempting_reconnect: true,
            metadata: json!({ "error": error.to_string() }),
        }
    }
}

/// Looks up every instance concurrently. A failed lookup becomes a
/// `Disconnected` record carrying the error; output order follows `instances`.
pub async fn collect_statuses(
    source: Arc<dyn InstanceApi>,
    instances: &[String],
) -> Vec<InstanceStatusRecord> {
    let mut lookups = JoinSet::new();
    for (index, instance) in instances.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        lookups.spawn(async move {
            let result = source.instance_status(&instance).await;
            (index, instance, result)
        });
    }

    let mut records: Vec<Option<InstanceStatusRecord>> = vec![None; instances.len()];
    while let Some(joined) = lookups.join_next().await {
        let Ok((index, instance, result)) = joined else {
            continue;
        };
        let record = match result {
            Ok(payload) => InstanceStatusRecord::from_payload(instance, payload),
            Err(error) => {
                warn!(
                    event_name = "messaging.status.lookup_failed",
                    instance = %instance,
                    error = %error,
                    "instance status lookup failed"
                );
                InstanceStatusRecord::unreachable(instance, error)
            }
        };
        records[index] = Some(record);
    }

    records
        .into_iter()
        .zip(instances)
        .map(|(record, instance)| {
            record.unwrap_or_else(|| {
                InstanceStatusRecord::unreachable(instance.clone(), "status lookup task aborted")
            })
        })
        .collect()
}

pub struct EvolutionClient {
    client: Client,
    base_url: String,
    token: SecretString,
    default_instance: Option<String>,
}

impl EvolutionClient {
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        default_instance: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MessagingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MessagingError::Transport(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, token, default_instance })
    }

    /// `None` when no base url is configured.
    pub fn from_config(config: &MessagingConfig) -> Result<Option<Self>, MessagingError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let base_url = config.base_url.clone().unwrap_or_default();
        let token = config
            .api_token
            .clone()
            .ok_or_else(|| MessagingError::NotConfigured("messaging.api_token".to_string()))?;

        Self::new(
            base_url,
            token,
            config.instance.clone(),
            Duration::from_secs(config.timeout_secs),
        )
        .map(Some)
    }

    pub fn default_instance(&self) -> Option<&str> {
        self.default_instance.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn for_instance(&self, request: RequestBuilder, instance: &str) -> RequestBuilder {
        request.bearer_auth(self.token.expose_secret()).header(INSTANCE_HEADER, instance)
    }
}

async fn check_status(
    response: Result<Response, reqwest::Error>,
) -> Result<Response, MessagingError> {
    let response = response.map_err(|error| MessagingError::Transport(error.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MessagingError::Status { status: status.as_u16(), body });
    }
    Ok(response)
}

async fn read_json(response: Result<Response, reqwest::Error>) -> Result<Value, MessagingError> {
    let response = check_status(response).await?;
    let body = response.text().await.map_err(|error| MessagingError::Decode(error.to_string()))?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|error| MessagingError::Decode(error.to_string()))
}

#[async_trait]
impl MessageSender for EvolutionClient {
    async fn send_message(&self, message: OutboundMessage) -> Result<(), MessagingError> {
        if message.to.trim().is_empty() || message.message.trim().is_empty() {
            return Err(MessagingError::InvalidMessage(
                "outbound message needs a recipient and text".to_string(),
            ));
        }
        let response = self
            .client
            .post(self.url("/messages"))
            .bearer_auth(self.token.expose_secret())
            .json(&message)
            .send()
            .await;
        check_status(response).await.map(|_| ())
    }
}

#[async_trait]
impl InstanceApi for EvolutionClient {
    async fn instance_status(&self, instance: &str) -> Result<Value, MessagingError> {
        let request = self.client.get(self.url(&format!("/instance/{instance}/status")));
        read_json(self.for_instance(request, instance).send().await).await
    }

    async fn restart_instance(&self, instance: &str) -> Result<Value, MessagingError> {
        let request = self.client.post(self.url(&format!("/instance/{instance}/restart")));
        read_json(self.for_instance(request, instance).send().await).await
    }

    async fn instance_qr_code(&self, instance: &str) -> Result<Value, MessagingError> {
        let request = self.client.get(self.url(&format!("/instance/{instance}/qrcode")));
        read_json(self.for_instance(request, instance).send().await).await
    }

    async fn send_text(
        &self,
        instance: &str,
        number: &str,
        text: &str,
    ) -> Result<Value, MessagingError> {
        if number.trim().is_empty() || text.trim().is_empty() {
            return Err(MessagingError::InvalidMessage(
                "send_text requires number and text".to_string(),
            ));
        }
        let request = self
            .client
            .post(self.url(&format!("/message/sendText/{instance}")))
            .json(&json!({ "number": number, "text": text }));
        read_json(self.for_instance(request, instance).send().await).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{
        collect_statuses, translate_status, ConnectionState, InstanceApi, MessagingError,
        OutboundMessage,
    };

    struct ScriptedSource;

    #[async_trait]
    impl InstanceApi for ScriptedSource {
        async fn instance_status(&self, instance: &str) -> Result<Value, MessagingError> {
            match instance {
                "main" => Ok(json!({ "state": "CONNECTED", "lastConnectedAt": "2024-05-01" })),
                "pairing" => Ok(json!({ "state": "qrcode" })),
                _ => Err(MessagingError::Status { status: 404, body: "no such instance".into() }),
            }
        }

        async fn restart_instance(&self, _instance: &str) -> Result<Value, MessagingError> {
            Ok(Value::Null)
        }

        async fn instance_qr_code(&self, _instance: &str) -> Result<Value, MessagingError> {
            Ok(Value::Null)
        }

        async fn send_text(
            &self,
            _instance: &str,
            _number: &str,
            _text: &str,
        ) -> Result<Value, MessagingError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn raw_states_translate_to_three_buckets() {
        assert_eq!(translate_status(Some("CONNECTED")), ConnectionState::Connected);
        assert_eq!(translate_status(Some("connected_ok")), ConnectionState::Connected);
        assert_eq!(translate_status(Some("pairing")), ConnectionState::Connecting);
        assert_eq!(translate_status(Some("INITIALIZING")), ConnectionState::Connecting);
        assert_eq!(translate_status(Some("DISCONNECTED")), ConnectionState::Disconnected);
        assert_eq!(translate_status(Some("close")), ConnectionState::Disconnected);
        assert_eq!(translate_status(None), ConnectionState::Disconnected);
    }

    #[test]
    fn outbound_message_uses_camel_case_reply_field() {
        let value = serde_json::to_value(OutboundMessage {
            to: "5511999990000".to_string(),
            message: "Oi!".to_string(),
            reply_to_message_id: Some("wamid-1".to_string()),
        })
        .expect("serialize");

        assert_eq!(
            value,
            json!({ "to": "5511999990000", "message": "Oi!", "replyToMessageId": "wamid-1" })
        );
    }

    #[tokio::test]
    async fn failed_lookup_does_not_fail_the_batch() {
        let instances = vec!["main".to_string(), "ghost".to_string(), "pairing".to_string()];
        let records = collect_statuses(Arc::new(ScriptedSource), &instances).await;

        let summary: Vec<(&str, ConnectionState)> =
            records.iter().map(|record| (record.instance.as_str(), record.status)).collect();
        assert_eq!(
            summary,
            vec![
                ("main", ConnectionState::Connected),
                ("ghost", ConnectionState::Disconnected),
                ("pairing", ConnectionState::Connecting),
            ]
        );
        assert!(!records[0].attempting_reconnect);
        assert_eq!(records[0].last_connected_at.as_deref(), Some("2024-05-01"));
        assert!(records[1].metadata["error"].as_str().is_some_and(|e| e.contains("404")));
    }
}
