use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// region: Identity Types

/// Identity attached to a request once its credential has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

/// Session issued by the identity provider on a successful sign in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<AuthenticatedUser>,
}

/// Result of a sign up: a full session when the account is confirmed
/// immediately, or only the created user when confirmation is pending.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum SignUpOutcome {
    Session(AuthSession),
    User(AuthenticatedUser),
}

// endregion: Identity Types

// region: Project Types

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Ctt,
    Rasch,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ctt => "ctt",
            Self::Rasch => "rasch",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ctt" => Ok(Self::Ctt),
            "rasch" => Ok(Self::Rasch),
            other => Err(other.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectSummary {
    pub name: String,
    #[serde(default)]
    pub total_options: Option<i64>,
    #[serde(default)]
    pub total_students: Option<i64>,
    #[serde(default)]
    pub total_questions: Option<i64>,
    #[serde(default, rename = "type")]
    pub analysis_type: Option<AnalysisType>,
}

/// Exam-level statistics stored for a project after an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeneralDetails {
    pub id: String,
    pub exam_id: String,
    pub project_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub avg_discrimination_index: Option<f64>,
    #[serde(default)]
    pub avg_difficulty_index: Option<f64>,
    #[serde(default)]
    pub cronbach_alpha: Option<f64>,
    #[serde(default)]
    pub avg_infit: Option<f64>,
    #[serde(default)]
    pub avg_outfit: Option<f64>,
    #[serde(default)]
    pub avg_reliability: Option<f64>,
    #[serde(default)]
    pub avg_score: Option<f64>,
    #[serde(default)]
    pub avg_rpbis: Option<f64>,
    #[serde(default)]
    pub projects: Option<ProjectSummary>,
}

// endregion: Project Types

// region: Analysis Types

/// Chart series for a project. Buckets are keyed by label, e.g. `{"range": 0.2, "count": 4}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Histogram {
    pub score: Vec<BTreeMap<String, f64>>,
    pub difficulty: Vec<BTreeMap<String, f64>>,
    pub discrimination: Vec<BTreeMap<String, f64>>,
    pub r_pbis: Vec<BTreeMap<String, f64>>,
    pub infit_outfit: Vec<InfitOutfitPoint>,
    pub scatter_plot: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InfitOutfitPoint {
    #[serde(rename = "questionNo")]
    pub question_no: i64,
    pub infit: f64,
    pub outfit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScatterPoint {
    pub difficulty: f64,
    pub discrimination: f64,
    pub question_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionMetrics {
    pub discrimination_index: f64,
    pub difficulty_index: f64,
    pub rpbis: f64,
    pub selection_rate: f64,
    #[serde(default)]
    pub group_choice_percentages: Vec<BTreeMap<String, f64>>,
    #[serde(default)]
    pub evaluation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionAnalysis {
    pub id: String,
    pub exam_id: String,
    pub content: String,
    #[serde(default)]
    pub correct_option_id: Option<String>,
    #[serde(default)]
    pub question_analysis: Option<QuestionMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptionMetrics {
    pub discrimination_index: f64,
    pub rpbis: f64,
    pub selection_rate: f64,
    pub selected_by: i64,
    pub top_selected: i64,
    pub bottom_selected: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptionAnalysis {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub option_analysis: Option<OptionMetrics>,
}

// endregion: Analysis Types

// region: Student Types

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentExam {
    pub student_exam_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub total_score: Option<f64>,
    pub exam_id: String,
    #[serde(default)]
    pub grade: Option<f64>,
    pub student_id: String,
    #[serde(default)]
    pub ability: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionLogit {
    pub question_id: String,
    pub logit: f64,
}

/// Payload of the `get_students_by_project_id` stored procedure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct StudentsAnalysis {
    pub students: Vec<StudentExam>,
    pub questions: Vec<QuestionLogit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OptionRef {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentAnswerResult {
    pub question_id: String,
    pub question_content: String,
    pub correct_option_id: Option<String>,
    pub correct_option_content: Option<String>,
    pub is_correct: bool,
    pub selected_option: Option<OptionRef>,
}

/// One student's exam with every answer flattened against its question.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResult {
    #[serde(flatten)]
    pub exam: StudentExam,
    pub answers: Vec<StudentAnswerResult>,
}

// endregion: Student Types

// region: Rasch Types

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RaschOptionAnalysis {
    pub id: String,
    pub content: String,
    pub rpbis: f64,
    pub discrimination_index: f64,
    pub selection_rate: f64,
    pub selected_by: i64,
    pub top_selected: i64,
    pub bottom_selected: i64,
    #[serde(default, rename = "type")]
    pub analysis_type: Option<AnalysisType>,
}

/// Item-level Rasch output as returned by `get_rasch_by_project_id`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RaschQuestionAnalysis {
    pub id: String,
    pub question_analysis_id: String,
    pub difficulty: f64,
    pub discrimination: f64,
    pub logit: f64,
    pub infit: f64,
    pub outfit: f64,
    pub reliability: f64,
    pub question_content: String,
    #[serde(default)]
    pub evaluation: Option<String>,
    #[serde(default)]
    pub options: Vec<RaschOptionAnalysis>,
}

// endregion: Rasch Types

// region: Analytics Types

/// Successful reply of the analytics service. `data` is relayed untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsReply {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

// endregion: Analytics Types

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn analysis_type_parses_case_insensitively() {
        assert_eq!("CTT".parse::<AnalysisType>(), Ok(AnalysisType::Ctt));
        assert_eq!(" rasch ".parse::<AnalysisType>(), Ok(AnalysisType::Rasch));
        assert_eq!("irt".parse::<AnalysisType>(), Err("irt".to_owned()));
    }

    #[test]
    fn sign_up_outcome_prefers_session() {
        let session: SignUpOutcome = serde_json::from_value(json!({
            "access_token": "abc",
            "user": { "id": "u1", "email": "new@mail.com", "role": "authenticated" }
        }))
        .unwrap();
        assert!(matches!(session, SignUpOutcome::Session(_)));

        let user: SignUpOutcome =
            serde_json::from_value(json!({ "id": "u1", "email": "new@mail.com" })).unwrap();
        assert!(matches!(user, SignUpOutcome::User(ref u) if u.id == "u1"));
    }

    #[test]
    fn student_result_flattens_exam_fields() {
        let result = StudentResult {
            exam: StudentExam {
                student_exam_id: "se1".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                total_score: Some(7.0),
                exam_id: "ex1".into(),
                grade: None,
                student_id: "st1".into(),
                ability: Some(0.5),
            },
            answers: vec![],
        };

        let body = serde_json::to_value(result).unwrap();
        assert_eq!(body["student_exam_id"], "se1");
        assert_eq!(body["answers"], json!([]));
    }
}
