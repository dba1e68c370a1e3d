use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use shared::types::{
    GeneralDetails, Histogram, OptionAnalysis, Project, QuestionAnalysis, RaschQuestionAnalysis,
    StudentsAnalysis,
};

use crate::domain::analysis::{AnalysisRepository, StudentExamRecord};
use crate::domain::project::ProjectRepository;
use crate::error::StoreError;
use crate::infrastructure::supabase::SupabaseClient;

const GENERAL_DETAILS_SELECT: &str =
    "*,projects(name,total_options,total_students,total_questions,type)";
const QUESTION_SELECT: &str = "id,exam_id,content,correct_option_id,question_analysis(*)";
const OPTION_SELECT: &str = "id,content,option_analysis(*)";
const STUDENT_EXAM_SELECT: &str = "id,first_name,last_name,total_score,exam_id,grade,student_id,ability,\
answers:student_answers(is_correct,selected_option:options!selected_option_id(id,content),\
question:questions(id,content,correct_option:options!correct_option_id(id,content)))";

#[derive(Deserialize)]
struct HistogramRow {
    histogram: Option<Histogram>,
}

#[derive(Deserialize)]
struct ExamRow {
    exam_id: String,
}

#[derive(Serialize)]
struct ProjectArgs<'a> {
    p_project_id: &'a str,
}

/// Table and stored procedure reads through PostgREST.
pub struct SupabaseRestClient {
    supabase: SupabaseClient,
}

impl SupabaseRestClient {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.supabase.url(&format!("/rest/v1/{table}"), params)?;
        tracing::debug!(%table, "Selecting rows");
        let res = self.supabase.request(Method::GET, url, None).send().await?;
        SupabaseClient::read(res).await
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<T>, StoreError> {
        let mut params = params.to_vec();
        params.push(("limit", "1"));
        let rows: Vec<T> = self.select(table, &params).await?;
        Ok(rows.into_iter().next())
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        project_id: &str,
    ) -> Result<Option<T>, StoreError> {
        let url = self.supabase.url(&format!("/rest/v1/rpc/{function}"), &[])?;
        tracing::debug!(%function, "Calling stored procedure");
        let res = self
            .supabase
            .request(Method::POST, url, None)
            .json(&ProjectArgs {
                p_project_id: project_id,
            })
            .send()
            .await?;
        SupabaseClient::read(res).await
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl ProjectRepository for SupabaseRestClient {
    #[tracing::instrument(skip(self))]
    async fn find_by_owner(&self, user_id: &str) -> Result<Vec<Project>, StoreError> {
        self.select(
            "projects",
            &[
                ("select", "id,name,description"),
                ("user_id", eq(user_id).as_str()),
                ("order", "created_at.desc"),
            ],
        )
        .await
    }
}

#[async_trait]
impl AnalysisRepository for SupabaseRestClient {
    #[tracing::instrument(skip(self))]
    async fn find_general_details(
        &self,
        project_id: &str,
    ) -> Result<Option<GeneralDetails>, StoreError> {
        self.select_one(
            "exam_analysis",
            &[
                ("select", GENERAL_DETAILS_SELECT),
                ("project_id", eq(project_id).as_str()),
            ],
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_histogram(&self, project_id: &str) -> Result<Option<Histogram>, StoreError> {
        let row: Option<HistogramRow> = self
            .select_one(
                "exam_analysis",
                &[("select", "histogram"), ("project_id", eq(project_id).as_str())],
            )
            .await?;
        Ok(row.and_then(|row| row.histogram))
    }

    #[tracing::instrument(skip(self))]
    async fn find_exam_id(&self, project_id: &str) -> Result<Option<String>, StoreError> {
        let row: Option<ExamRow> = self
            .select_one(
                "exam_analysis",
                &[("select", "exam_id"), ("project_id", eq(project_id).as_str())],
            )
            .await?;
        Ok(row.map(|row| row.exam_id))
    }

    #[tracing::instrument(skip(self))]
    async fn find_questions(&self, exam_id: &str) -> Result<Vec<QuestionAnalysis>, StoreError> {
        self.select(
            "questions",
            &[("select", QUESTION_SELECT), ("exam_id", eq(exam_id).as_str())],
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_question(
        &self,
        question_id: &str,
    ) -> Result<Option<QuestionAnalysis>, StoreError> {
        self.select_one(
            "questions",
            &[("select", QUESTION_SELECT), ("id", eq(question_id).as_str())],
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_options(&self, question_id: &str) -> Result<Vec<OptionAnalysis>, StoreError> {
        self.select(
            "options",
            &[("select", OPTION_SELECT), ("question_id", eq(question_id).as_str())],
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_option(&self, option_id: &str) -> Result<Option<OptionAnalysis>, StoreError> {
        self.select_one(
            "options",
            &[("select", OPTION_SELECT), ("id", eq(option_id).as_str())],
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn find_student_exam(
        &self,
        student_exam_id: &str,
    ) -> Result<Option<StudentExamRecord>, StoreError> {
        self.select_one(
            "student_exams",
            &[
                ("select", STUDENT_EXAM_SELECT),
                ("id", eq(student_exam_id).as_str()),
            ],
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn students_by_project(
        &self,
        project_id: &str,
    ) -> Result<Option<StudentsAnalysis>, StoreError> {
        self.rpc("get_students_by_project_id", project_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn rasch_by_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<RaschQuestionAnalysis>, StoreError> {
        let rows: Option<Vec<RaschQuestionAnalysis>> =
            self.rpc("get_rasch_by_project_id", project_id).await?;
        Ok(rows.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_use_postgrest_equality() {
        assert_eq!(eq("p1"), "eq.p1");
    }

    #[test]
    fn rpc_arguments_use_project_parameter_name() {
        let body = serde_json::to_value(ProjectArgs { p_project_id: "p1" }).unwrap();

        assert_eq!(body, json!({ "p_project_id": "p1" }));
    }

    #[test]
    fn histogram_row_with_null_column_is_absent() {
        let row: HistogramRow = serde_json::from_value(json!({ "histogram": null })).unwrap();

        assert!(row.histogram.is_none());
    }

    #[test]
    fn student_select_embeds_answers_with_their_question() {
        assert!(STUDENT_EXAM_SELECT.contains("answers:student_answers("));
        assert!(STUDENT_EXAM_SELECT.contains("correct_option:options!correct_option_id(id,content)"));
    }
}
