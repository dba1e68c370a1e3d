use std::sync::Arc;

use crate::config::CredentialTransport;
use crate::domain::{
    analysis::AnalysisRepository, analytics::AnalyticsClient, identity::IdentityProvider,
    project::ProjectRepository,
};

pub struct GatewayAppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub projects: Arc<dyn ProjectRepository>,
    pub analysis: Arc<dyn AnalysisRepository>,
    pub analytics: Arc<dyn AnalyticsClient>,
    pub credential_transport: CredentialTransport,
    pub max_upload_bytes: usize,
}
