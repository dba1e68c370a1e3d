use axum::http::StatusCode;
use shared::responses::EmptyApiResponse;

use crate::api::{Reply, respond};

#[utoipa::path(
    get,
    path = "/api/ping",
    tag = "Health",
    operation_id = "ping",
    responses(
        (status = 200, description = "Service is up", body = EmptyApiResponse)
    )
)]
pub async fn ping() -> Reply<()> {
    respond(StatusCode::OK, "pong", ())
}
