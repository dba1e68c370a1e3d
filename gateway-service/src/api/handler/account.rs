use std::sync::Arc;

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use shared::{
    responses::{ApiResponse, ErrorEnvelope},
    types::{AuthenticatedUser, Project},
};

use crate::{
    api::{Reply, respond, state::GatewayAppState},
    error::GatewayError,
};

#[utoipa::path(
    get,
    path = "/api/my/profile",
    tag = "Account",
    operation_id = "get_profile",
    responses(
        (status = 200, description = "The signed in user", body = ApiResponse<AuthenticatedUser>),
        (status = 401, description = "Missing or invalid credential", body = ErrorEnvelope)
    )
)]
pub async fn profile(Extension(user): Extension<AuthenticatedUser>) -> Reply<AuthenticatedUser> {
    respond(StatusCode::OK, "User retrieved successfully", user)
}

#[utoipa::path(
    get,
    path = "/api/my/projects",
    tag = "Account",
    operation_id = "list_projects",
    responses(
        (status = 200, description = "Projects owned by the signed in user", body = ApiResponse<Vec<Project>>),
        (status = 400, description = "Store rejected the query", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid credential", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn projects(
    State(state): State<Arc<GatewayAppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Reply<Vec<Project>>, GatewayError> {
    let projects = state
        .projects
        .find_by_owner(&user.id)
        .await
        .map_err(|e| e.reclassify(StatusCode::BAD_REQUEST, None))?;

    Ok(respond(
        StatusCode::OK,
        "Projects retrieved successfully",
        projects,
    ))
}
