use async_trait::async_trait;
use serde::Deserialize;
use shared::types::{
    GeneralDetails, Histogram, OptionAnalysis, OptionRef, QuestionAnalysis, RaschQuestionAnalysis,
    StudentAnswerResult, StudentExam, StudentResult, StudentsAnalysis,
};

use crate::error::StoreError;

/// Question as embedded in a stored answer row.
#[derive(Debug, Clone, Deserialize)]
pub struct AnsweredQuestion {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub correct_option: Option<OptionRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentAnswerRecord {
    pub is_correct: bool,
    #[serde(default)]
    pub selected_option: Option<OptionRef>,
    pub question: AnsweredQuestion,
}

/// A `student_exams` row with its answers embedded, as the store returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentExamRecord {
    pub id: String,
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
    #[serde(default)]
    pub answers: Vec<StudentAnswerRecord>,
}

impl StudentExamRecord {
    /// Flattens every answer against its question and correct option.
    pub fn into_result(self) -> StudentResult {
        let answers = self
            .answers
            .into_iter()
            .map(|answer| {
                let (correct_option_id, correct_option_content) = match answer.question.correct_option
                {
                    Some(option) => (Some(option.id), Some(option.content)),
                    None => (None, None),
                };
                StudentAnswerResult {
                    question_id: answer.question.id,
                    question_content: answer.question.content,
                    correct_option_id,
                    correct_option_content,
                    is_correct: answer.is_correct,
                    selected_option: answer.selected_option,
                }
            })
            .collect();

        StudentResult {
            exam: StudentExam {
                student_exam_id: self.id,
                first_name: self.first_name,
                last_name: self.last_name,
                total_score: self.total_score,
                exam_id: self.exam_id,
                grade: self.grade,
                student_id: self.student_id,
                ability: self.ability,
            },
            answers,
        }
    }
}

/// Read access to stored analysis output.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn find_general_details(
        &self,
        project_id: &str,
    ) -> Result<Option<GeneralDetails>, StoreError>;
    async fn find_histogram(&self, project_id: &str) -> Result<Option<Histogram>, StoreError>;
    /// The exam analysed for a project.
    async fn find_exam_id(&self, project_id: &str) -> Result<Option<String>, StoreError>;
    async fn find_questions(&self, exam_id: &str) -> Result<Vec<QuestionAnalysis>, StoreError>;
    async fn find_question(&self, question_id: &str)
    -> Result<Option<QuestionAnalysis>, StoreError>;
    async fn find_options(&self, question_id: &str) -> Result<Vec<OptionAnalysis>, StoreError>;
    async fn find_option(&self, option_id: &str) -> Result<Option<OptionAnalysis>, StoreError>;
    async fn find_student_exam(
        &self,
        student_exam_id: &str,
    ) -> Result<Option<StudentExamRecord>, StoreError>;
    /// Calls the `get_students_by_project_id` stored procedure.
    async fn students_by_project(
        &self,
        project_id: &str,
    ) -> Result<Option<StudentsAnalysis>, StoreError>;
    /// Calls the `get_rasch_by_project_id` stored procedure.
    async fn rasch_by_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<RaschQuestionAnalysis>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn student_exam_record_is_flattened() {
        let record: StudentExamRecord = serde_json::from_value(json!({
            "id": "se1",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "total_score": 1.0,
            "exam_id": "ex1",
            "grade": null,
            "student_id": "st1",
            "ability": 0.25,
            "answers": [
                {
                    "is_correct": true,
                    "selected_option": { "id": "o1", "content": "4" },
                    "question": {
                        "id": "q1",
                        "content": "2 + 2?",
                        "correct_option": { "id": "o1", "content": "4" }
                    }
                },
                {
                    "is_correct": false,
                    "selected_option": null,
                    "question": { "id": "q2", "content": "Skipped?", "correct_option": null }
                }
            ]
        }))
        .unwrap();

        let result = record.into_result();

        assert_eq!(result.exam.student_exam_id, "se1");
        assert_eq!(result.answers.len(), 2);
        assert_eq!(result.answers[0].correct_option_content.as_deref(), Some("4"));
        assert!(result.answers[0].is_correct);
        assert_eq!(result.answers[1].selected_option, None);
        assert_eq!(result.answers[1].correct_option_id, None);
    }
}
