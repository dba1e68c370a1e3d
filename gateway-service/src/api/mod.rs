pub mod handler;
pub mod middleware;
pub mod router;
pub mod state;

use axum::{Json, http::StatusCode};
use serde::Serialize;
use shared::responses::ApiResponse;

/// A success reply whose envelope `code` is always the transport status.
pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn respond<T: Serialize>(status: StatusCode, message: &str, data: T) -> Reply<T> {
    (status, Json(ApiResponse::new(status.as_u16(), message, data)))
}
