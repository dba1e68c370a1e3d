use async_trait::async_trait;
use shared::types::Project;

use crate::error::StoreError;

#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Projects owned by `user_id`, newest first.
    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<Project>, StoreError>;
}
