use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Message carried by every response for a failure nobody classified.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Standard JSON success envelope.
///
/// `code` mirrors the HTTP status the response is sent with, so it is only
/// ever built from a status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates an envelope for the given status code.
    pub fn new(code: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}

/// Response envelope for operations that return no data (`data` is always `null`).
#[derive(Debug, Serialize, ToSchema)]
pub struct EmptyApiResponse {
    pub code: u16,
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

/// Standard JSON failure envelope.
///
/// `error` is `null`, a structured detail object, or a string rendering of an
/// unclassified failure. It is always present in the serialized body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub message: String,
    #[schema(value_type = Option<Object>)]
    pub error: Value,
    pub code: u16,
}

impl ErrorEnvelope {
    pub fn new(code: u16, message: impl Into<String>, error: Value) -> Self {
        Self {
            message: message.into(),
            error,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_envelope_always_serializes_error_field() {
        let body = serde_json::to_value(ErrorEnvelope::new(400, "Bad", Value::Null)).unwrap();

        assert_eq!(body, json!({ "message": "Bad", "error": null, "code": 400 }));
    }

    #[test]
    fn unit_payload_serializes_as_null_data() {
        let body = serde_json::to_value(ApiResponse::new(200, "pong", ())).unwrap();

        assert_eq!(body, json!({ "code": 200, "message": "pong", "data": null }));
    }
}
