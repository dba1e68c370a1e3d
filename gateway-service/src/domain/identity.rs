use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use shared::types::{AuthSession, AuthenticatedUser, SignUpOutcome};
use utoipa::ToSchema;

use crate::error::StoreError;

/// Email and password submitted to the sign in and sign up endpoints.
///
/// Missing fields deserialize as empty strings so handlers can answer with
/// their own validation message.
#[derive(Clone, Default, Deserialize, ToSchema)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SignUpOptions {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SignUpRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub option: Option<SignUpOptions>,
}

/// The identity collaborator: verifies access tokens and manages sessions.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves an access token to its user; `Ok(None)` when the token is not accepted.
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthenticatedUser>, StoreError>;
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, StoreError>;
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, StoreError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), StoreError>;
}
