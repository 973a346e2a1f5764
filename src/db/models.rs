use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::{Date, PrimitiveDateTime};

use crate::db::types::{DifficultyLevel, EssayStatus, KnowledgeArea, MentorRole, MockExamStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct UserStats {
    pub(crate) user_id: String,
    pub(crate) average_score: f64,
    pub(crate) scored_count: i32,
    pub(crate) essays_completed: i32,
    pub(crate) exams_completed: i32,
    pub(crate) study_minutes: i64,
    pub(crate) streak_days: i32,
    pub(crate) last_study_date: Option<Date>,
    pub(crate) xp: i64,
    pub(crate) level: i32,
    pub(crate) completion_percent: f64,
    pub(crate) badges: Json<Vec<String>>,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Purchaser {
    pub(crate) email: String,
    pub(crate) full_name: Option<String>,
    pub(crate) product: Option<String>,
    pub(crate) transaction_id: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) purchased_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CompetencyResult {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) score: i32,
    pub(crate) comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Essay {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) theme: String,
    pub(crate) text: String,
    pub(crate) text_hash: String,
    pub(crate) status: EssayStatus,
    pub(crate) competencies: Json<Vec<CompetencyResult>>,
    pub(crate) total_score: Option<i32>,
    pub(crate) strengths: Json<Vec<String>>,
    pub(crate) improvements: Json<Vec<String>>,
    pub(crate) general_comment: Option<String>,
    pub(crate) corrected_text: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) time_spent_minutes: Option<i32>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ExamQuestion {
    pub(crate) number: u32,
    pub(crate) area: KnowledgeArea,
    pub(crate) statement: String,
    pub(crate) options: Vec<String>,
    /// Index into `options`.
    pub(crate) correct_option: usize,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AreaResult {
    pub(crate) area: KnowledgeArea,
    pub(crate) total: u32,
    pub(crate) correct: u32,
    pub(crate) incorrect: u32,
    pub(crate) blank: u32,
    pub(crate) score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ExamReport {
    pub(crate) areas: Vec<AreaResult>,
    pub(crate) correct: u32,
    pub(crate) incorrect: u32,
    pub(crate) blank: u32,
    pub(crate) overall_score: i32,
    pub(crate) weak_areas: Vec<KnowledgeArea>,
    pub(crate) strong_areas: Vec<KnowledgeArea>,
    pub(crate) recommendations: Vec<String>,
    /// Model name, or `fallback` when the canned list was used.
    pub(crate) recommendations_source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct MockExam {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) title: String,
    pub(crate) areas: Json<Vec<KnowledgeArea>>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) status: MockExamStatus,
    pub(crate) questions: Json<Vec<ExamQuestion>>,
    pub(crate) answers: Option<Json<Vec<Option<usize>>>>,
    pub(crate) report: Option<Json<ExamReport>>,
    pub(crate) overall_score: Option<i32>,
    pub(crate) generated_by: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PlanActivity {
    pub(crate) day: u32,
    /// ISO date (`YYYY-MM-DD`).
    pub(crate) date: String,
    pub(crate) subject: String,
    pub(crate) topic: String,
    pub(crate) duration_minutes: u32,
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default)]
    pub(crate) completed: bool,
    #[serde(default)]
    pub(crate) completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct StudyPlan {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) start_date: Date,
    pub(crate) end_date: Date,
    pub(crate) profile: Json<serde_json::Value>,
    pub(crate) activities: Json<Vec<PlanActivity>>,
    pub(crate) completed_count: i32,
    pub(crate) total_count: i32,
    pub(crate) xp_earned: i64,
    pub(crate) source: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct MentorMessage {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) role: MentorRole,
    pub(crate) content: String,
    pub(crate) created_at: PrimitiveDateTime,
}
