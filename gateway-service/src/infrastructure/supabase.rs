use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::StoreError;
use crate::infrastructure::propagation::trace_headers;

/// Per-request timeout applied to every store and identity call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error object returned by PostgREST (`message`) and GoTrue (`msg`, `error_description`).
#[derive(Debug, Default, Deserialize)]
struct StoreErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl StoreErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .filter(|m| !m.is_empty())
    }
}

/// HTTP access to a Supabase project, authenticated with its anonymous key.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (invalid TLS configuration).
    pub fn new(base_url: String, anon_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url,
            anon_key,
        }
    }

    pub(crate) fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, StoreError> {
        let raw = format!("{}{path}", self.base_url);
        Url::parse_with_params(&raw, params)
            .map_err(|e| StoreError::Transport(format!("Invalid store URL {raw}: {e}")))
    }

    /// Starts a request carrying the project key, the caller's token (or the
    /// project key when there is none) and the current trace context.
    pub(crate) fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(&self.anon_key);
        self.client
            .request(method, url)
            .headers(trace_headers())
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    /// Decodes a successful reply, or turns a failed one into a [`StoreError`].
    pub(crate) async fn read<T: DeserializeOwned>(res: Response) -> Result<T, StoreError> {
        let status = res.status();
        tracing::debug!(%status, "Store responded");

        if !status.is_success() {
            return Err(Self::rejection(status, res).await);
        }

        res.json::<T>().await.map_err(|e| {
            StoreError::Transport(format!("Failed to deserialize store response: {e}"))
        })
    }

    /// Like [`Self::read`] for calls whose reply body is irrelevant.
    pub(crate) async fn discard(res: Response) -> Result<(), StoreError> {
        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::rejection(status, res).await)
        }
    }

    pub(crate) async fn rejection(status: StatusCode, res: Response) -> StoreError {
        let body = res.text().await.unwrap_or_default();
        rejection_from(status, &body)
    }
}

/// A failure body with a recognizable message is a rejection; anything else is a transport fault.
pub(crate) fn rejection_from(status: StatusCode, body: &str) -> StoreError {
    match serde_json::from_str::<StoreErrorBody>(body)
        .ok()
        .and_then(StoreErrorBody::into_message)
    {
        Some(message) => StoreError::rejected(message),
        None => StoreError::Transport(format!("Store responded with {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgrest_message_is_a_rejection() {
        let error = rejection_from(
            StatusCode::BAD_REQUEST,
            r#"{"code":"42P01","details":null,"hint":null,"message":"Query error"}"#,
        );

        assert_eq!(error, StoreError::rejected("Query error"));
    }

    #[test]
    fn gotrue_messages_are_rejections() {
        assert_eq!(
            rejection_from(
                StatusCode::BAD_REQUEST,
                r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
            ),
            StoreError::rejected("Invalid login credentials")
        );
        assert_eq!(
            rejection_from(
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#,
            ),
            StoreError::rejected("Email not confirmed")
        );
    }

    #[test]
    fn unreadable_body_is_a_transport_failure() {
        let error = rejection_from(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");

        assert!(matches!(error, StoreError::Transport(ref m) if m.contains("502")));
    }

    #[test]
    fn url_carries_encoded_params() {
        let client = SupabaseClient::new("https://project.supabase.co".into(), "anon".into());

        let url = client
            .url("/rest/v1/projects", &[("user_id", "eq.a b")])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/rest/v1/projects?user_id=eq.a+b"
        );
    }
}
