use async_trait::async_trait;
use axum::body::Bytes;
use shared::types::{AnalysisType, AnalyticsReply};

use crate::error::UpstreamError;

/// Multipart field carrying the students' answer sheet.
pub const RESULT_FILE_FIELD: &str = "result_file";
/// Multipart field carrying the exam key.
pub const EXAM_FILE_FIELD: &str = "exam_file";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Optional scalar form fields, relayed verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOptions {
    pub project_name: Option<String>,
    pub number_of_group: Option<String>,
    pub group_percentage: Option<String>,
    pub correlation_rpbis: Option<String>,
}

impl AnalysisOptions {
    /// Wire name and value of every field that was supplied.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("projectName", &self.project_name),
            ("numberOfGroup", &self.number_of_group),
            ("groupPercentage", &self.group_percentage),
            ("correlationRpbis", &self.correlation_rpbis),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }

    /// Stores `value` under the wire name `name`; returns false for unknown names.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "projectName" => &mut self.project_name,
            "numberOfGroup" => &mut self.number_of_group,
            "groupPercentage" => &mut self.group_percentage,
            "correlationRpbis" => &mut self.correlation_rpbis,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisUpload {
    pub analysis_type: AnalysisType,
    pub result_file: UploadedFile,
    pub exam_file: UploadedFile,
    pub options: AnalysisOptions,
    /// The caller's access token, forwarded so the service can attribute the project.
    pub credential: Option<String>,
}

/// The analytics collaborator.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait AnalyticsClient: Send + Sync {
    async fn analyze(&self, upload: AnalysisUpload) -> Result<AnalyticsReply, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_supplied_options_are_relayed() {
        let mut options = AnalysisOptions::default();
        assert!(options.set("projectName", "My Project".into()));
        assert!(options.set("groupPercentage", "30".into()));
        assert!(!options.set("unknown", "x".into()));

        assert_eq!(
            options.fields(),
            vec![("projectName", "My Project"), ("groupPercentage", "30")]
        );
    }
}
