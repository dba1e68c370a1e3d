use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use shared::types::AnalyticsReply;

use crate::domain::analytics::{
    AnalysisUpload, AnalyticsClient, EXAM_FILE_FIELD, RESULT_FILE_FIELD, UploadedFile,
};
use crate::error::{UpstreamError, UpstreamErrorBody};
use crate::infrastructure::propagation::trace_headers;

/// HTTP client for the analytics service. Each upload is sent once; there are no retries.
pub struct HttpAnalyticsClient {
    client: Client,
    base_url: String,
}

impl HttpAnalyticsClient {
    /// Builds an HTTP client that gives up after `timeout`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (invalid TLS configuration).
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { client, base_url }
    }
}

fn file_part(file: UploadedFile) -> Result<Part, UpstreamError> {
    Part::bytes(file.bytes.to_vec())
        .file_name(file.file_name)
        .mime_str(&file.content_type)
        .map_err(|e| UpstreamError::without_body(format!("Invalid upload content type: {e}")))
}

fn build_form(upload: AnalysisUpload) -> Result<Form, UpstreamError> {
    let mut form = Form::new()
        .part(RESULT_FILE_FIELD, file_part(upload.result_file)?)
        .part(EXAM_FILE_FIELD, file_part(upload.exam_file)?);
    for (name, value) in upload.options.fields() {
        form = form.text(name, value.to_owned());
    }
    Ok(form)
}

/// Interprets a non-success reply: a recognizable failure body is kept for relaying.
fn failure_from(status: StatusCode, body: &str) -> UpstreamError {
    match serde_json::from_str::<UpstreamErrorBody>(body) {
        Ok(parsed) => UpstreamError::with_body(status, parsed),
        Err(_) => UpstreamError::without_body(format!("Analytics service responded with {status}")),
    }
}

#[async_trait]
impl AnalyticsClient for HttpAnalyticsClient {
    #[tracing::instrument(skip_all, fields(analysis_type = %upload.analysis_type))]
    async fn analyze(&self, upload: AnalysisUpload) -> Result<AnalyticsReply, UpstreamError> {
        let url = format!("{}/api/analyze/{}", self.base_url, upload.analysis_type);
        let credential = upload.credential.clone();
        let form = build_form(upload)?;

        tracing::debug!(%url, "Relaying upload to analytics service");

        let mut request = self
            .client
            .post(&url)
            .headers(trace_headers())
            .multipart(form);
        if let Some(token) = credential {
            request = request.bearer_auth(token);
        }

        let res = request.send().await?;
        let status = res.status();
        tracing::debug!(%status, "Analytics service responded");

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(failure_from(status, &body));
        }

        res.json::<AnalyticsReply>().await.map_err(|e| {
            UpstreamError::without_body(format!("Failed to deserialize analytics response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HasStructuredErrorBody;

    #[test]
    fn structured_failure_body_is_kept() {
        let error = failure_from(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Flask error","code":400,"error":{"row":3}}"#,
        );

        let body = error.structured_error_body().unwrap();
        assert_eq!(body.message, "Flask error");
        assert_eq!(body.code, Some(400));
    }

    #[test]
    fn html_failure_has_no_body() {
        let error = failure_from(StatusCode::INTERNAL_SERVER_ERROR, "<h1>Internal</h1>");

        assert!(error.structured_error_body().is_none());
        assert!(error.to_string().contains("500"));
    }
}
