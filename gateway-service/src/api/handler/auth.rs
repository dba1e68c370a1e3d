use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::{
    CookieJar, WithRejection,
    cookie::{Cookie, SameSite},
};
use shared::{
    responses::{ApiResponse, EmptyApiResponse, ErrorEnvelope},
    types::{AuthSession, SignUpOutcome},
};

use crate::{
    api::{Reply, middleware::extract_credential, respond, state::GatewayAppState},
    config::CredentialTransport,
    domain::identity::{Credentials, SignUpRequest},
    error::{AppError, GatewayError},
};

const CREDENTIALS_REQUIRED: &str = "Email and password are required";

fn session_cookie(name: &str, token: &str) -> Cookie<'static> {
    Cookie::build((name.to_owned(), token.to_owned()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    tag = "Auth",
    operation_id = "sign_in",
    request_body = Credentials,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = ApiResponse<AuthSession>),
        (status = 400, description = "Missing fields or rejected credentials", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip_all, fields(email = %credentials.email))]
pub async fn sign_in(
    State(state): State<Arc<GatewayAppState>>,
    jar: CookieJar,
    WithRejection(Json(credentials), _): WithRejection<Json<Credentials>, GatewayError>,
) -> Result<(CookieJar, Reply<AuthSession>), GatewayError> {
    if !credentials.is_complete() {
        return Err(AppError::bad_request(CREDENTIALS_REQUIRED).into());
    }

    let session = state
        .identity
        .sign_in(&credentials)
        .await
        .map_err(|e| e.reclassify(StatusCode::BAD_REQUEST, None))?;

    let jar = match &state.credential_transport {
        CredentialTransport::Cookie { name } => {
            jar.add(session_cookie(name, &session.access_token))
        }
        CredentialTransport::Bearer => jar,
    };

    tracing::info!("User signed in");
    Ok((
        jar,
        respond(StatusCode::OK, "User signed in successfully", session),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "Auth",
    operation_id = "sign_up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<SignUpOutcome>),
        (status = 400, description = "Missing fields or rejected sign up", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.credentials.email))]
pub async fn sign_up(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Json(request), _): WithRejection<Json<SignUpRequest>, GatewayError>,
) -> Result<Reply<SignUpOutcome>, GatewayError> {
    if !request.credentials.is_complete() {
        return Err(AppError::bad_request(CREDENTIALS_REQUIRED).into());
    }

    let outcome = state
        .identity
        .sign_up(&request)
        .await
        .map_err(|e| e.reclassify(StatusCode::BAD_REQUEST, None))?;

    tracing::info!("User signed up");
    Ok(respond(
        StatusCode::CREATED,
        "User signed up successfully",
        outcome,
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/signout",
    tag = "Auth",
    operation_id = "sign_out",
    responses(
        (status = 200, description = "Signed out; session cookie cleared", body = EmptyApiResponse),
        (status = 400, description = "Sign out rejected", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sign_out(
    State(state): State<Arc<GatewayAppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Reply<()>), GatewayError> {
    if let Some(token) = extract_credential(&state.credential_transport, &headers) {
        state
            .identity
            .sign_out(&token)
            .await
            .map_err(|e| e.reclassify(StatusCode::BAD_REQUEST, None))?;
    }

    let jar = match &state.credential_transport {
        CredentialTransport::Cookie { name } => {
            jar.remove(Cookie::build((name.clone(), "")).path("/"))
        }
        CredentialTransport::Bearer => jar,
    };

    Ok((
        jar,
        respond(StatusCode::OK, "User signed out successfully", ()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_locked_down() {
        let cookie = session_cookie("auth_token", "abc");

        assert_eq!(cookie.name(), "auth_token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
