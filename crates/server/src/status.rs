use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use concierge_agent::messaging::{
    collect_statuses, InstanceApi, InstanceStatusRecord, MessagingError,
};
use concierge_core::errors::ApplicationError;
use concierge_core::validation::ValidationError;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{correlation_id, ApiError};

#[derive(Clone)]
pub struct StatusState {
    api: Option<Arc<dyn InstanceApi>>,
    default_instance: Option<String>,
}

impl StatusState {
    pub fn new(api: Option<Arc<dyn InstanceApi>>, default_instance: Option<String>) -> Self {
        Self { api, default_instance }
    }

    fn api(&self, correlation_id: &str) -> Result<Arc<dyn InstanceApi>, ApiError> {
        self.api.clone().ok_or_else(|| {
            ApiError::from_application(
                ApplicationError::Integration("messaging is not configured".to_string()),
                correlation_id,
            )
        })
    }
}

/// Operator test message sent straight through an instance.
#[derive(Debug, Default, Deserialize)]
pub struct TestMessage {
    pub number: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Comma separated instance keys.
    pub instance: Option<String>,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/status", get(list_statuses))
        .route("/status/{instance}/restart", post(restart_instance))
        .route("/status/{instance}/qrcode", get(instance_qr_code))
        .route("/status/{instance}/messages", post(send_test_message))
        .with_state(state)
}

fn requested_instances(query: StatusQuery, default_instance: Option<&str>) -> Vec<String> {
    let requested: Vec<String> = query
        .instance
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if requested.is_empty() {
        default_instance.map(|name| vec![name.to_string()]).unwrap_or_default()
    } else {
        requested
    }
}

fn integration_failure(error: MessagingError, correlation_id: &str) -> ApiError {
    ApiError::from_application(ApplicationError::Integration(error.to_string()), correlation_id)
}

pub async fn list_statuses(
    State(state): State<StatusState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<InstanceStatusRecord>>, ApiError> {
    let correlation_id = correlation_id();
    let api = state.api(&correlation_id)?;
    let instances = requested_instances(query, state.default_instance.as_deref());
    if instances.is_empty() {
        return Err(ApiError::from_application(
            ValidationError::field("instance", "is required when no default instance is set")
                .into(),
            &correlation_id,
        ));
    }

    let records = collect_statuses(api, &instances).await;
    info!(
        event_name = "api.status.collected",
        correlation_id = %correlation_id,
        instances = records.len(),
        "instance statuses collected"
    );
    Ok(Json(records))
}

pub async fn restart_instance(
    State(state): State<StatusState>,
    Path(instance): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = correlation_id();
    let api = state.api(&correlation_id)?;
    let payload = api
        .restart_instance(&instance)
        .await
        .map_err(|error| integration_failure(error, &correlation_id))?;

    info!(
        event_name = "api.status.restart_requested",
        correlation_id = %correlation_id,
        instance = %instance,
        "instance restart requested"
    );
    Ok(Json(payload))
}

pub async fn instance_qr_code(
    State(state): State<StatusState>,
    Path(instance): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = correlation_id();
    let api = state.api(&correlation_id)?;
    api.instance_qr_code(&instance)
        .await
        .map(Json)
        .map_err(|error| integration_failure(error, &correlation_id))
}

pub async fn send_test_message(
    State(state): State<StatusState>,
    Path(instance): Path<String>,
    body: Result<Json<TestMessage>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = correlation_id();
    let Json(message) =
        body.map_err(|rejection| ApiError::from_rejection(rejection, &correlation_id))?;
    let api = state.api(&correlation_id)?;

    let number = message.number.unwrap_or_default();
    let text = message.text.unwrap_or_default();
    let payload = api.send_text(&instance, &number, &text).await.map_err(|error| match error {
        MessagingError::InvalidMessage(detail) => ApiError::from_application(
            ValidationError::field("number/text", detail).into(),
            &correlation_id,
        ),
        other => integration_failure(other, &correlation_id),
    })?;

    info!(
        event_name = "api.status.test_message_sent",
        correlation_id = %correlation_id,
        instance = %instance,
        "test message sent"
    );
    Ok(Json(payload))
}
