//! Workflow endpoints. Each request gets a fresh correlation id that tags the
//! workflow's log events and any error body returned to the caller.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use concierge_agent::workflow::{
    BridgeOutcome, OnboardingOutcome, SimulationOutcome, SupportOutcome, WorkflowEngine,
    WorkflowError,
};
use concierge_core::errors::ApplicationError;
use concierge_core::validation::{OnboardingForm, SimulationRequest, SupportRequest, WebhookPayload};
use tracing::{info_span, Instrument};

use crate::error::{correlation_id, ApiError};

#[derive(Clone)]
pub struct ApiState {
    engine: Arc<WorkflowEngine>,
}

impl ApiState {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/simulator/messages", post(simulator_message))
        .route("/api/v1/whatsapp/webhook", post(whatsapp_webhook))
        .route("/api/v1/helpdesk/requests", post(helpdesk_request))
        .route("/api/v1/onboarding/profile", post(onboarding_profile))
        .with_state(state)
}

fn reject(error: WorkflowError, correlation_id: &str) -> ApiError {
    ApiError::from_application(ApplicationError::from(error), correlation_id)
}

pub async fn simulator_message(
    State(state): State<ApiState>,
    body: Result<Json<SimulationRequest>, JsonRejection>,
) -> Result<Json<SimulationOutcome>, ApiError> {
    let correlation_id = correlation_id();
    let Json(input) =
        body.map_err(|rejection| ApiError::from_rejection(rejection, &correlation_id))?;
    state
        .engine
        .run_simulation(input)
        .instrument(info_span!("api.simulator", correlation_id = %correlation_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id))
}

pub async fn whatsapp_webhook(
    State(state): State<ApiState>,
    body: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<BridgeOutcome>, ApiError> {
    let correlation_id = correlation_id();
    let Json(input) =
        body.map_err(|rejection| ApiError::from_rejection(rejection, &correlation_id))?;
    state
        .engine
        .run_messaging_bridge(input)
        .instrument(info_span!("api.whatsapp_webhook", correlation_id = %correlation_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id))
}

pub async fn helpdesk_request(
    State(state): State<ApiState>,
    body: Result<Json<SupportRequest>, JsonRejection>,
) -> Result<Json<SupportOutcome>, ApiError> {
    let correlation_id = correlation_id();
    let Json(input) =
        body.map_err(|rejection| ApiError::from_rejection(rejection, &correlation_id))?;
    state
        .engine
        .run_support(input)
        .instrument(info_span!("api.helpdesk", correlation_id = %correlation_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id))
}

pub async fn onboarding_profile(
    State(state): State<ApiState>,
    body: Result<Json<OnboardingForm>, JsonRejection>,
) -> Result<Json<OnboardingOutcome>, ApiError> {
    let correlation_id = correlation_id();
    let Json(input) =
        body.map_err(|rejection| ApiError::from_rejection(rejection, &correlation_id))?;
    state
        .engine
        .run_onboarding(input)
        .instrument(info_span!("api.onboarding", correlation_id = %correlation_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id))
}
