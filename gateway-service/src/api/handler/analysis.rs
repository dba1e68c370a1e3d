use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State, multipart::Field},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::Value;
use shared::{
    responses::{ApiResponse, ErrorEnvelope},
    types::{
        AnalysisType, AnalyticsReply, GeneralDetails, Histogram, OptionAnalysis, QuestionAnalysis,
        RaschQuestionAnalysis, StudentResult, StudentsAnalysis,
    },
};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{Reply, middleware::extract_credential, respond, state::GatewayAppState},
    domain::analytics::{
        AnalysisOptions, AnalysisUpload, EXAM_FILE_FIELD, RESULT_FILE_FIELD, UploadedFile,
    },
    error::{AppError, GatewayError, StoreError},
};

const PROJECT_ID_REQUIRED: &str = r#"Query parameter "projectId" is required"#;
const QUESTION_ID_REQUIRED: &str = r#"Query parameters "questionId" are required"#;
const OPTION_ID_REQUIRED: &str = r#"Query parameters "optionId" are required"#;
const STUDENT_EXAM_ID_REQUIRED: &str = r#"Query parameter "studentExamId" is required"#;
const TYPE_REQUIRED: &str = r#"Query parameter "type" is required"#;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AnalyzeQuery {
    /// `ctt` or `rasch`.
    #[serde(rename = "type")]
    pub analysis_type: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProjectQuery {
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct QuestionQuery {
    pub question_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OptionQuery {
    pub option_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    pub student_exam_id: Option<String>,
}

/// Multipart body accepted by `POST /api/analyze`. Only used for the OpenAPI document.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct AnalyzeForm {
    #[schema(value_type = String, format = Binary)]
    result_file: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    exam_file: Vec<u8>,
    #[schema(rename = "projectName")]
    project_name: Option<String>,
    #[schema(rename = "numberOfGroup")]
    number_of_group: Option<String>,
    #[schema(rename = "groupPercentage")]
    group_percentage: Option<String>,
    #[schema(rename = "correlationRpbis")]
    correlation_rpbis: Option<String>,
}

fn require(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(message))
}

fn table_failure(e: StoreError) -> GatewayError {
    e.reclassify(StatusCode::INTERNAL_SERVER_ERROR, Some("Supabase error"))
}

fn rpc_failure(e: StoreError) -> GatewayError {
    e.reclassify(StatusCode::INTERNAL_SERVER_ERROR, Some("Supabase RPC error"))
}

async fn read_file(field: Field<'_>, name: &str) -> Result<Option<UploadedFile>, GatewayError> {
    let file_name = field.file_name().unwrap_or(name).to_owned();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_owned();
    let bytes = field.bytes().await?;

    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadedFile {
        file_name,
        content_type,
        bytes,
    }))
}

#[utoipa::path(
    post,
    path = "/api/analyze",
    tag = "Analysis",
    operation_id = "analyze",
    params(AnalyzeQuery),
    request_body(content = AnalyzeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Analysis computed and stored", body = AnalyticsReply),
        (status = 400, description = "Invalid type, missing or repeated file", body = ErrorEnvelope),
        (status = 500, description = "Analysis failed", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip_all, fields(analysis_type = ?query.analysis_type))]
pub async fn analyze(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<AnalyzeQuery>, GatewayError>,
    headers: HeaderMap,
    WithRejection(mut multipart, _): WithRejection<Multipart, GatewayError>,
) -> Result<Reply<Value>, GatewayError> {
    let raw_type = require(query.analysis_type, TYPE_REQUIRED)?;
    let analysis_type: AnalysisType = raw_type
        .parse()
        .map_err(|value| AppError::bad_request(format!("Invalid analysis type: {value}")))?;

    let mut result_file = None;
    let mut exam_file = None;
    let mut seen_files: Vec<String> = Vec::with_capacity(2);
    let mut options = AnalysisOptions::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if name == RESULT_FILE_FIELD || name == EXAM_FILE_FIELD {
            if seen_files.contains(&name) {
                return Err(AppError::bad_request(format!("Unexpected field: {name}")).into());
            }
            seen_files.push(name.clone());
        }
        match name.as_str() {
            RESULT_FILE_FIELD => result_file = read_file(field, RESULT_FILE_FIELD).await?,
            EXAM_FILE_FIELD => exam_file = read_file(field, EXAM_FILE_FIELD).await?,
            _ => {
                let value = field.text().await?;
                if !options.set(&name, value) {
                    tracing::debug!(field = %name, "Ignoring unknown form field");
                }
            }
        }
    }

    let result_file = result_file
        .ok_or_else(|| AppError::bad_request(format!("Missing file: {RESULT_FILE_FIELD}")))?;
    let exam_file = exam_file
        .ok_or_else(|| AppError::bad_request(format!("Missing file: {EXAM_FILE_FIELD}")))?;

    let upload = AnalysisUpload {
        analysis_type,
        result_file,
        exam_file,
        options,
        credential: extract_credential(&state.credential_transport, &headers),
    };

    let reply = state.analytics.analyze(upload).await?;

    let data = match reply.data {
        Some(data) if !data.is_null() => data,
        _ => {
            tracing::warn!(message = %reply.message, "Analytics service returned no data");
            return Err(AppError::internal("Analysis failed").into());
        }
    };
    let status = reply
        .code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    tracing::info!(%status, "Analysis completed");
    Ok(respond(status, &reply.message, data))
}

#[utoipa::path(
    get,
    path = "/api/general-details",
    tag = "Analysis",
    operation_id = "get_general_details",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Exam-level statistics", body = ApiResponse<GeneralDetails>),
        (status = 400, description = "Missing projectId", body = ErrorEnvelope),
        (status = 404, description = "Project not found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn general_details(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ProjectQuery>, GatewayError>,
) -> Result<Reply<GeneralDetails>, GatewayError> {
    let project_id = require(query.project_id, PROJECT_ID_REQUIRED)?;

    let details = state
        .analysis
        .find_general_details(&project_id)
        .await
        .map_err(table_failure)?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    Ok(respond(StatusCode::OK, "General details retrieved", details))
}

#[utoipa::path(
    get,
    path = "/api/histogram",
    tag = "Analysis",
    operation_id = "get_histogram",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Chart series", body = ApiResponse<Histogram>),
        (status = 400, description = "Missing projectId", body = ErrorEnvelope),
        (status = 404, description = "Project not found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn histogram(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ProjectQuery>, GatewayError>,
) -> Result<Reply<Histogram>, GatewayError> {
    let project_id = require(query.project_id, PROJECT_ID_REQUIRED)?;

    let histogram = state
        .analysis
        .find_histogram(&project_id)
        .await
        .map_err(table_failure)?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    Ok(respond(StatusCode::OK, "Histogram data retrieved", histogram))
}

#[utoipa::path(
    get,
    path = "/api/questions",
    tag = "Analysis",
    operation_id = "list_question_analyses",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Every question of the project's exam", body = ApiResponse<Vec<QuestionAnalysis>>),
        (status = 400, description = "Missing projectId", body = ErrorEnvelope),
        (status = 404, description = "Exam or questions not found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn questions(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ProjectQuery>, GatewayError>,
) -> Result<Reply<Vec<QuestionAnalysis>>, GatewayError> {
    let project_id = require(query.project_id, PROJECT_ID_REQUIRED)?;

    let exam_id = state
        .analysis
        .find_exam_id(&project_id)
        .await
        .map_err(table_failure)?
        .ok_or_else(|| AppError::not_found("Exam not found"))?;

    let questions = state
        .analysis
        .find_questions(&exam_id)
        .await
        .map_err(table_failure)?;
    if questions.is_empty() {
        return Err(AppError::not_found("Questions not found").into());
    }

    Ok(respond(
        StatusCode::OK,
        "All question analyses retrieved",
        questions,
    ))
}

#[utoipa::path(
    get,
    path = "/api/question",
    tag = "Analysis",
    operation_id = "get_question_analysis",
    params(QuestionQuery),
    responses(
        (status = 200, description = "One question with its analysis", body = ApiResponse<QuestionAnalysis>),
        (status = 400, description = "Missing questionId", body = ErrorEnvelope),
        (status = 404, description = "Question not found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn question(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<QuestionQuery>, GatewayError>,
) -> Result<Reply<QuestionAnalysis>, GatewayError> {
    let question_id = require(query.question_id, QUESTION_ID_REQUIRED)?;

    let question = state
        .analysis
        .find_question(&question_id)
        .await
        .map_err(table_failure)?
        .ok_or_else(|| AppError::not_found("Question not found"))?;

    Ok(respond(
        StatusCode::OK,
        "Specific question analysis retrieved",
        question,
    ))
}

#[utoipa::path(
    get,
    path = "/api/options",
    tag = "Analysis",
    operation_id = "list_option_analyses",
    params(QuestionQuery),
    responses(
        (status = 200, description = "Options of a question with their analysis", body = ApiResponse<Vec<OptionAnalysis>>),
        (status = 400, description = "Missing questionId", body = ErrorEnvelope),
        (status = 404, description = "Options not found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn options(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<QuestionQuery>, GatewayError>,
) -> Result<Reply<Vec<OptionAnalysis>>, GatewayError> {
    let question_id = require(query.question_id, QUESTION_ID_REQUIRED)?;

    let options = state
        .analysis
        .find_options(&question_id)
        .await
        .map_err(table_failure)?;
    if options.is_empty() {
        return Err(AppError::not_found("Options not found").into());
    }

    Ok(respond(StatusCode::OK, "Options analysis retrieved", options))
}

#[utoipa::path(
    get,
    path = "/api/option",
    tag = "Analysis",
    operation_id = "get_option_analysis",
    params(OptionQuery),
    responses(
        (status = 200, description = "One option with its analysis", body = ApiResponse<OptionAnalysis>),
        (status = 400, description = "Missing optionId", body = ErrorEnvelope),
        (status = 404, description = "Option not found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn option(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<OptionQuery>, GatewayError>,
) -> Result<Reply<OptionAnalysis>, GatewayError> {
    let option_id = require(query.option_id, OPTION_ID_REQUIRED)?;

    let option = state
        .analysis
        .find_option(&option_id)
        .await
        .map_err(table_failure)?
        .ok_or_else(|| AppError::not_found("Option not found"))?;

    Ok(respond(
        StatusCode::OK,
        "Specific option analysis retrieved",
        option,
    ))
}

#[utoipa::path(
    get,
    path = "/api/students",
    tag = "Analysis",
    operation_id = "list_students",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Students and item logits of a project", body = ApiResponse<StudentsAnalysis>),
        (status = 400, description = "Missing projectId", body = ErrorEnvelope),
        (status = 404, description = "No students found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn students(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ProjectQuery>, GatewayError>,
) -> Result<Reply<StudentsAnalysis>, GatewayError> {
    let project_id = require(query.project_id, PROJECT_ID_REQUIRED)?;

    let students = state
        .analysis
        .students_by_project(&project_id)
        .await
        .map_err(table_failure)?
        .ok_or_else(|| AppError::not_found("No students found for this project"))?;

    Ok(respond(
        StatusCode::OK,
        "Students retrieved successfully",
        students,
    ))
}

#[utoipa::path(
    get,
    path = "/api/student",
    tag = "Analysis",
    operation_id = "get_student_result",
    params(StudentQuery),
    responses(
        (status = 200, description = "One student's exam with every answer", body = ApiResponse<StudentResult>),
        (status = 400, description = "Missing studentExamId", body = ErrorEnvelope),
        (status = 404, description = "No student result found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn student(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<StudentQuery>, GatewayError>,
) -> Result<Reply<StudentResult>, GatewayError> {
    let student_exam_id = require(query.student_exam_id, STUDENT_EXAM_ID_REQUIRED)?;

    let record = state
        .analysis
        .find_student_exam(&student_exam_id)
        .await
        .map_err(rpc_failure)?
        .ok_or_else(|| AppError::not_found("No student result found"))?;

    Ok(respond(
        StatusCode::OK,
        "Student result retrieved",
        record.into_result(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/rasch",
    tag = "Analysis",
    operation_id = "get_rasch_analysis",
    params(ProjectQuery),
    responses(
        (status = 200, description = "Item-level Rasch output", body = ApiResponse<Vec<RaschQuestionAnalysis>>),
        (status = 400, description = "Missing projectId", body = ErrorEnvelope),
        (status = 404, description = "No Rasch analysis found", body = ErrorEnvelope)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn rasch(
    State(state): State<Arc<GatewayAppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ProjectQuery>, GatewayError>,
) -> Result<Reply<Vec<RaschQuestionAnalysis>>, GatewayError> {
    let project_id = require(query.project_id, PROJECT_ID_REQUIRED)?;

    let items = state
        .analysis
        .rasch_by_project(&project_id)
        .await
        .map_err(rpc_failure)?;
    if items.is_empty() {
        return Err(AppError::not_found("No Rasch analysis found for this project").into());
    }

    Ok(respond(
        StatusCode::OK,
        "Rasch analysis retrieved successfully",
        items,
    ))
}
