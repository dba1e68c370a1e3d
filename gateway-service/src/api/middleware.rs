use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use tower_governor::GovernorError;

use crate::api::state::GatewayAppState;
use crate::config::CredentialTransport;
use crate::error::{AppError, GatewayError};

pub const MISSING_TOKEN: &str = "Unauthorized: Missing token";
pub const INVALID_TOKEN: &str = "Unauthorized: Invalid token";
pub const PATH_NOT_FOUND: &str = "Path not found";

/// Reads the session credential from wherever this deployment carries it.
/// Blank values count as absent.
pub fn extract_credential(transport: &CredentialTransport, headers: &HeaderMap) -> Option<String> {
    let token = match transport {
        CredentialTransport::Cookie { name } => CookieJar::from_headers(headers)
            .get(name)
            .map(|cookie| cookie.value().to_owned()),
        CredentialTransport::Bearer => headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_owned()),
    };
    token.filter(|token| !token.trim().is_empty())
}

/// Rejects requests without a verifiable credential; otherwise attaches the
/// caller's identity to the request and runs the rest of the chain.
pub async fn require_auth(
    State(state): State<Arc<GatewayAppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = extract_credential(&state.credential_transport, req.headers())
        .ok_or_else(|| AppError::unauthorized(MISSING_TOKEN))?;

    let user = match state.identity.get_user(&token).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AppError::unauthorized(INVALID_TOKEN).into()),
        Err(e) => {
            tracing::warn!(error = %e, "Credential verification failed");
            return Err(AppError::unauthorized(INVALID_TOKEN).into());
        }
    };

    tracing::debug!(user_id = %user.id, "Request authenticated");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Answers every request that matched no route.
pub async fn not_found() -> GatewayError {
    AppError::not_found(PATH_NOT_FOUND).into()
}

/// Renders a handler panic through the normal error path.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    };

    GatewayError::Unexpected(detail).into_response()
}

/// Renders a rate-limit rejection as an error envelope, keeping the quota headers.
pub fn rate_limited(error: GovernorError) -> Response {
    let (parts, message) = error.into_response().into_parts();

    let mut response = GatewayError::from(AppError::new(message, parts.status)).into_response();
    response.headers_mut().extend(parts.headers);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn cookie_credential_is_read_by_name() {
        let transport = CredentialTransport::default();

        let token = extract_credential(
            &transport,
            &headers(header::COOKIE, "theme=dark; auth_token=abc"),
        );

        assert_eq!(token.as_deref(), Some("abc"));
    }

    #[test]
    fn empty_cookie_is_missing() {
        let transport = CredentialTransport::default();

        assert_eq!(
            extract_credential(&transport, &headers(header::COOKIE, "auth_token=")),
            None
        );
    }

    #[test]
    fn bearer_transport_ignores_cookies() {
        let transport = CredentialTransport::Bearer;

        assert_eq!(
            extract_credential(&transport, &headers(header::COOKIE, "auth_token=abc")),
            None
        );
        assert_eq!(
            extract_credential(&transport, &headers(header::AUTHORIZATION, "Bearer xyz"))
                .as_deref(),
            Some("xyz")
        );
        assert_eq!(
            extract_credential(&transport, &headers(header::AUTHORIZATION, "Basic xyz")),
            None
        );
    }

    #[test]
    fn panic_payload_becomes_unexpected_error() {
        let response = handle_panic(Box::new("boom"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rate_limit_keeps_status_and_quota_headers() {
        let mut quota = HeaderMap::new();
        quota.insert("retry-after", HeaderValue::from_static("3"));

        let response = rate_limited(GovernorError::TooManyRequests {
            wait_time: 3,
            headers: Some(quota),
        });

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "3");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}
