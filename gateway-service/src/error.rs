use std::fmt;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use shared::responses::{ErrorEnvelope, UNEXPECTED_ERROR_MESSAGE};
use thiserror::Error;

/// Structured detail attached to a failure, emitted as the envelope's `error` object.
pub type ErrorDetail = Map<String, Value>;

/// A handler decided to stop with a specific status and message.
#[derive(Debug, Clone, PartialEq)]
pub struct AppError {
    pub message: String,
    pub status: StatusCode,
    pub detail: Option<ErrorDetail>,
}

impl AppError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
            detail: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, status: StatusCode, detail: ErrorDetail) -> Self {
        Self {
            message: message.into(),
            status,
            detail: Some(detail),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

/// Failure body the analytics service sends alongside a non-success status.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpstreamErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

impl UpstreamErrorBody {
    /// The status the upstream reported, if it is usable as an HTTP status.
    pub fn status(&self) -> Option<StatusCode> {
        self.code
            .filter(|code| *code >= 100)
            .and_then(|code| StatusCode::from_u16(code).ok())
    }
}

/// Implemented by collaborator failures that may carry a recognizable upstream body.
pub trait HasStructuredErrorBody {
    fn structured_error_body(&self) -> Option<&UpstreamErrorBody>;
}

/// A call to the analytics service that did not produce a usable reply.
#[derive(Debug, Error)]
#[error("{summary}")]
pub struct UpstreamError {
    summary: String,
    body: Option<UpstreamErrorBody>,
}

impl UpstreamError {
    /// The service answered with `status` and a structured failure body.
    pub fn with_body(status: StatusCode, body: UpstreamErrorBody) -> Self {
        Self {
            summary: format!("Analytics service responded with {status}: {}", body.message),
            body: Some(body),
        }
    }

    /// The call failed without anything recognizable to relay.
    pub fn without_body(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            body: None,
        }
    }
}

impl HasStructuredErrorBody for UpstreamError {
    fn structured_error_body(&self) -> Option<&UpstreamErrorBody> {
        self.body.as_ref()
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::without_body(format!("Analytics service request failed: {e}"))
    }
}

/// A call to the data store or identity provider failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store answered with an error object carrying `message`.
    #[error("{message}")]
    Rejected { message: String },

    /// The store could not be reached or its reply could not be read.
    #[error("Data store request failed: {0}")]
    Transport(String),
}

impl StoreError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Re-wraps a store rejection as a domain error with `status`, optionally
    /// prefixing its message. Transport failures stay unclassified.
    pub fn reclassify(self, status: StatusCode, prefix: Option<&str>) -> GatewayError {
        match self {
            Self::Rejected { message } => {
                let message = match prefix {
                    Some(prefix) => format!("{prefix}: {message}"),
                    None => message,
                };
                AppError::new(message, status).into()
            }
            transport @ Self::Transport(_) => GatewayError::Store(transport),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Every way a request can fail. Rendered exclusively through [`normalize`].
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other runtime fault, including caught panics.
    #[error("Error: {0}")]
    Unexpected(String),
}

impl HasStructuredErrorBody for GatewayError {
    fn structured_error_body(&self) -> Option<&UpstreamErrorBody> {
        match self {
            Self::Upstream(e) => e.structured_error_body(),
            _ => None,
        }
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::new(rejection.body_text(), rejection.status()).into()
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(rejection.body_text(), rejection.status()).into()
    }
}

impl From<MultipartRejection> for GatewayError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::new(rejection.body_text(), rejection.status()).into()
    }
}

impl From<MultipartError> for GatewayError {
    fn from(e: MultipartError) -> Self {
        AppError::new(e.body_text(), e.status()).into()
    }
}

/// Maps a failure to the status and envelope it is answered with.
///
/// First match wins:
/// 1. a domain error keeps its own status, message and detail;
/// 2. a structured upstream body with a usable `code` is mirrored verbatim;
/// 3. anything else becomes a 500 carrying the failure's string rendering.
pub fn normalize(error: &GatewayError) -> (StatusCode, ErrorEnvelope) {
    if let GatewayError::App(app) = error {
        let detail = app.detail.clone().map_or(Value::Null, Value::Object);
        return (
            app.status,
            ErrorEnvelope::new(app.status.as_u16(), app.message.clone(), detail),
        );
    }

    if let Some(body) = error.structured_error_body()
        && let Some(status) = body.status()
    {
        let detail = body.error.clone().map_or(Value::Null, Value::Object);
        return (
            status,
            ErrorEnvelope::new(status.as_u16(), body.message.clone(), detail),
        );
    }

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        ErrorEnvelope::new(
            status.as_u16(),
            UNEXPECTED_ERROR_MESSAGE,
            Value::String(error.to_string()),
        ),
    )
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = normalize(&self);

        match &self {
            Self::App(app) if !status.is_server_error() => {
                tracing::warn!(%status, message = %app.message, detail = ?app.detail, "Client error");
            }
            Self::App(app) => {
                tracing::error!(%status, message = %app.message, detail = ?app.detail, "Server error");
            }
            Self::Upstream(e) if e.structured_error_body().is_some() => {
                tracing::warn!(%status, error = %e, detail = ?body.error, "Analytics service error relayed");
            }
            other => {
                tracing::error!(%status, error = %other, "Unexpected error");
            }
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail(value: Value) -> ErrorDetail {
        match value {
            Value::Object(map) => map,
            _ => panic!("detail must be an object"),
        }
    }

    #[test]
    fn domain_error_keeps_status_message_and_detail() {
        let error: GatewayError = AppError::with_detail(
            "Not found",
            StatusCode::NOT_FOUND,
            detail(json!({ "path": "/unknown" })),
        )
        .into();

        let (status, body) = normalize(&error);

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "Not found");
        assert_eq!(body.code, 404);
        assert_eq!(body.error, json!({ "path": "/unknown" }));
    }

    #[test]
    fn domain_error_without_detail_emits_null() {
        let error: GatewayError = AppError::bad_request("Email and password are required").into();

        let (status, body) = normalize(&error);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({ "message": "Email and password are required", "error": null, "code": 400 })
        );
    }

    #[test]
    fn structured_upstream_body_is_mirrored() {
        let body = UpstreamErrorBody {
            message: "Flask error".into(),
            code: Some(422),
            error: Some(detail(json!({ "reason": "invalid input" }))),
        };
        let error: GatewayError =
            UpstreamError::with_body(StatusCode::UNPROCESSABLE_ENTITY, body).into();

        let (status, envelope) = normalize(&error);

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(envelope.message, "Flask error");
        assert_eq!(envelope.code, 422);
        assert_eq!(envelope.error, json!({ "reason": "invalid input" }));
    }

    #[test]
    fn upstream_code_is_not_reinterpreted_by_transport_status() {
        let body = UpstreamErrorBody {
            message: "Bad sheet".into(),
            code: Some(400),
            error: None,
        };
        let error: GatewayError = UpstreamError::with_body(StatusCode::OK, body).into();

        let (status, envelope) = normalize(&error);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope.error, Value::Null);
    }

    #[test]
    fn upstream_body_without_code_falls_back_to_500() {
        let body = UpstreamErrorBody {
            message: "Flask error".into(),
            code: None,
            error: None,
        };
        let error: GatewayError =
            UpstreamError::with_body(StatusCode::BAD_GATEWAY, body).into();

        let (status, envelope) = normalize(&error);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message, UNEXPECTED_ERROR_MESSAGE);
        assert!(envelope.error.as_str().unwrap().contains("Flask error"));
    }

    #[test]
    fn upstream_body_with_unusable_code_falls_back_to_500() {
        let body = UpstreamErrorBody {
            message: "weird".into(),
            code: Some(42),
            error: None,
        };
        let error: GatewayError = UpstreamError::with_body(StatusCode::OK, body).into();

        assert_eq!(normalize(&error).0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upstream_failure_without_body_is_unexpected() {
        let error: GatewayError = UpstreamError::without_body("connection refused").into();

        let (status, envelope) = normalize(&error);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.error, json!("connection refused"));
    }

    #[test]
    fn generic_error_is_stringified() {
        let error = GatewayError::Unexpected("Unexpected".into());

        let (status, envelope) = normalize(&error);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message, "An unexpected error occurred.");
        assert_eq!(envelope.code, 500);
        assert!(envelope.error.as_str().unwrap().contains("Unexpected"));
    }

    #[test]
    fn store_transport_failure_is_unexpected() {
        let error: GatewayError = StoreError::Transport("timed out".into()).into();

        let (status, envelope) = normalize(&error);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(envelope.error.as_str().unwrap().contains("timed out"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let errors: Vec<GatewayError> = vec![
            AppError::bad_request("Query error").into(),
            UpstreamError::with_body(
                StatusCode::BAD_REQUEST,
                UpstreamErrorBody {
                    message: "Flask error".into(),
                    code: Some(400),
                    error: None,
                },
            )
            .into(),
            GatewayError::Unexpected("boom".into()),
        ];

        for error in &errors {
            let first = serde_json::to_vec(&normalize(error).1).unwrap();
            let second = serde_json::to_vec(&normalize(error).1).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn rejection_is_reclassified_with_status_and_prefix() {
        let error = StoreError::rejected("Database error")
            .reclassify(StatusCode::INTERNAL_SERVER_ERROR, Some("Supabase error"));

        let (status, envelope) = normalize(&error);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope.message, "Supabase error: Database error");
        assert_eq!(envelope.error, Value::Null);
    }

    #[test]
    fn transport_failure_survives_reclassification() {
        let error = StoreError::Transport("dns".into()).reclassify(StatusCode::BAD_REQUEST, None);

        assert!(matches!(error, GatewayError::Store(StoreError::Transport(_))));
    }
}
