use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use shared::types::{AuthSession, AuthenticatedUser, SignUpOutcome};

use crate::domain::identity::{Credentials, IdentityProvider, SignUpRequest};
use crate::error::StoreError;
use crate::infrastructure::supabase::SupabaseClient;

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct UserMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: UserMetadata<'a>,
}

/// [`IdentityProvider`] backed by the Supabase auth API.
pub struct SupabaseAuthClient {
    supabase: SupabaseClient,
}

impl SupabaseAuthClient {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    #[tracing::instrument(skip_all)]
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthenticatedUser>, StoreError> {
        let url = self.supabase.url("/auth/v1/user", &[])?;
        let res = self
            .supabase
            .request(Method::GET, url, Some(access_token))
            .send()
            .await?;

        match res.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                tracing::debug!(status = %res.status(), "Access token not accepted");
                Ok(None)
            }
            _ => SupabaseClient::read(res).await.map(Some),
        }
    }

    #[tracing::instrument(skip_all, fields(email = %credentials.email))]
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, StoreError> {
        let url = self
            .supabase
            .url("/auth/v1/token", &[("grant_type", "password")])?;
        let res = self
            .supabase
            .request(Method::POST, url, None)
            .json(&PasswordGrant {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await?;

        SupabaseClient::read(res).await
    }

    #[tracing::instrument(skip_all, fields(email = %request.credentials.email))]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, StoreError> {
        let url = self.supabase.url("/auth/v1/signup", &[])?;
        let body = SignUpBody {
            email: &request.credentials.email,
            password: &request.credentials.password,
            data: UserMetadata {
                username: request
                    .option
                    .as_ref()
                    .and_then(|option| option.username.as_deref()),
            },
        };
        let res = self
            .supabase
            .request(Method::POST, url, None)
            .json(&body)
            .send()
            .await?;

        SupabaseClient::read(res).await
    }

    #[tracing::instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), StoreError> {
        let url = self.supabase.url("/auth/v1/logout", &[])?;
        let res = self
            .supabase
            .request(Method::POST, url, Some(access_token))
            .send()
            .await?;

        SupabaseClient::discard(res).await
    }
}
