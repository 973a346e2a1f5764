use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{ExamQuestion, ExamReport, MockExam};
use crate::db::types::{DifficultyLevel, KnowledgeArea, MockExamStatus};
use crate::schemas::dashboard::ProgressResponse;
use crate::services::mock_exam::option_letter;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct MockExamCreate {
    #[validate(length(min = 1, max = 4, message = "choose between 1 and 4 areas"))]
    pub(crate) areas: Vec<KnowledgeArea>,
    #[serde(alias = "questionsPerArea")]
    #[validate(range(min = 1, max = 45, message = "questions_per_area must be between 1 and 45"))]
    pub(crate) questions_per_area: u32,
    #[serde(default)]
    pub(crate) difficulty: DifficultyLevel,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct MockExamSubmit {
    pub(crate) answers: Vec<Option<String>>,
    #[serde(default, alias = "timeSpentMinutes")]
    #[validate(range(max = 600, message = "time_spent_minutes must be at most 600"))]
    pub(crate) time_spent_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) letter: String,
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) number: u32,
    pub(crate) area: KnowledgeArea,
    pub(crate) statement: String,
    pub(crate) options: Vec<OptionResponse>,
    /// Hidden until the exam is submitted.
    pub(crate) correct_option: Option<String>,
    pub(crate) explanation: Option<String>,
    pub(crate) selected_option: Option<String>,
}

fn letter(index: usize) -> String {
    option_letter(index).map(String::from).unwrap_or_default()
}

impl QuestionResponse {
    fn build(question: ExamQuestion, reveal: bool, selected: Option<usize>) -> Self {
        Self {
            number: question.number,
            area: question.area,
            statement: question.statement,
            options: question
                .options
                .into_iter()
                .enumerate()
                .map(|(index, text)| OptionResponse { letter: letter(index), text })
                .collect(),
            correct_option: reveal.then(|| letter(question.correct_option)),
            explanation: if reveal { question.explanation } else { None },
            selected_option: selected.map(letter),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MockExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) areas: Vec<KnowledgeArea>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) status: MockExamStatus,
    pub(crate) questions: Vec<QuestionResponse>,
    pub(crate) report: Option<ExamReport>,
    pub(crate) overall_score: Option<i32>,
    pub(crate) generated_by: String,
    pub(crate) created_at: String,
    pub(crate) submitted_at: Option<String>,
}

impl MockExamResponse {
    pub(crate) fn from_db(exam: MockExam) -> Self {
        let reveal = exam.status == MockExamStatus::Submitted;
        let answers = exam.answers.map(|answers| answers.0).unwrap_or_default();
        let questions = exam
            .questions
            .0
            .into_iter()
            .enumerate()
            .map(|(position, question)| {
                let selected = answers.get(position).copied().flatten();
                QuestionResponse::build(question, reveal, selected)
            })
            .collect();

        Self {
            id: exam.id,
            title: exam.title,
            areas: exam.areas.0,
            difficulty: exam.difficulty,
            status: exam.status,
            questions,
            report: exam.report.map(|report| report.0),
            overall_score: exam.overall_score,
            generated_by: exam.generated_by,
            created_at: format_primitive(exam.created_at),
            submitted_at: exam.submitted_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MockExamSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) areas: Vec<KnowledgeArea>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) status: MockExamStatus,
    pub(crate) question_count: usize,
    pub(crate) overall_score: Option<i32>,
    pub(crate) created_at: String,
    pub(crate) submitted_at: Option<String>,
}

impl MockExamSummary {
    pub(crate) fn from_db(exam: &MockExam) -> Self {
        Self {
            id: exam.id.clone(),
            title: exam.title.clone(),
            areas: exam.areas.0.clone(),
            difficulty: exam.difficulty,
            status: exam.status,
            question_count: exam.questions.0.len(),
            overall_score: exam.overall_score,
            created_at: format_primitive(exam.created_at),
            submitted_at: exam.submitted_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MockExamSubmitResponse {
    pub(crate) exam: MockExamResponse,
    pub(crate) progress: ProgressResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use sqlx::types::Json;

    fn exam(status: MockExamStatus, answers: Option<Vec<Option<usize>>>) -> MockExam {
        MockExam {
            id: "exam-1".to_string(),
            user_id: "user-1".to_string(),
            title: "Simulado".to_string(),
            areas: Json(vec![KnowledgeArea::Matematica]),
            difficulty: DifficultyLevel::Medium,
            status,
            questions: Json(vec![ExamQuestion {
                number: 1,
                area: KnowledgeArea::Matematica,
                statement: "2 + 2 = ?".to_string(),
                options: vec!["3".to_string(), "4".to_string()],
                correct_option: 1,
                explanation: Some("Soma simples.".to_string()),
            }]),
            answers: answers.map(Json),
            report: None,
            overall_score: None,
            generated_by: "model".to_string(),
            created_at: primitive_now_utc(),
            submitted_at: None,
        }
    }

    #[test]
    fn open_exam_hides_answer_key() {
        let response = MockExamResponse::from_db(exam(MockExamStatus::Generated, None));
        let question = &response.questions[0];
        assert_eq!(question.options[1].letter, "B");
        assert_eq!(question.correct_option, None);
        assert_eq!(question.explanation, None);
        assert_eq!(question.selected_option, None);
    }

    #[test]
    fn submitted_exam_reveals_answer_key() {
        let response =
            MockExamResponse::from_db(exam(MockExamStatus::Submitted, Some(vec![Some(0)])));
        let question = &response.questions[0];
        assert_eq!(question.correct_option.as_deref(), Some("B"));
        assert_eq!(question.selected_option.as_deref(), Some("A"));
        assert_eq!(question.explanation.as_deref(), Some("Soma simples."));
    }
}
