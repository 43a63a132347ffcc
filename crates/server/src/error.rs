use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use concierge_core::errors::{ApplicationError, InterfaceError};
use concierge_core::validation::ValidationError;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

pub fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

/// Transport rendering of an [`InterfaceError`]. Server-side failures keep
/// their cause in the logs only.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        warn!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            error = %error,
            "request failed"
        );
        Self(error.into_interface(correlation_id))
    }

    /// Body that could not be read as JSON of the expected shape.
    pub fn from_rejection(rejection: JsonRejection, correlation_id: &str) -> Self {
        Self::from_application(
            ValidationError::field("body", rejection.body_text()).into(),
            correlation_id,
        )
    }

    pub fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let detail = match &self.0 {
            InterfaceError::BadRequest { message, .. } | InterfaceError::NotFound { message, .. } => {
                Some(message.clone())
            }
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => None,
        };
        ErrorBody {
            error: self.0.user_message().to_string(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use concierge_core::errors::ApplicationError;
    use concierge_core::validation::ValidationError;

    use super::ApiError;

    #[test]
    fn validation_failures_render_as_bad_request_with_detail() {
        let error = ApiError::from_application(
            ValidationError::field("customerId", "must be a UUID").into(),
            "req-9",
        );

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        let body = error.body();
        assert_eq!(body.correlation_id, "req-9");
        assert!(body.detail.expect("detail").contains("customerId"));
    }

    #[test]
    fn server_side_failures_hide_their_cause() {
        let error = ApiError::from_application(
            ApplicationError::Persistence("disk I/O error at /var/db".to_string()),
            "req-10",
        );

        let body = error.body();
        assert_eq!(body.detail, None);
        assert!(!body.error.contains("/var/db"));
        assert_eq!(error.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
