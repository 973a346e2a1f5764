use serde_json::{json, Value};
use thiserror::Error;
use time::{Date, Duration};

use crate::core::time::{format_date, parse_date};
use crate::db::models::PlanActivity;
use crate::db::types::{DifficultyLevel, KnowledgeArea};
use crate::services::llm::LlmClient;

pub(crate) const MAX_PLAN_DAYS: i64 = 120;
pub(crate) const MIN_ACTIVITY_MINUTES: u32 = 15;
pub(crate) const MAX_ACTIVITY_MINUTES: u32 = 240;
pub(crate) const FALLBACK_SOURCE: &str = "fallback";

const SESSION_MINUTES: u32 = 60;
const MAX_SESSIONS_PER_DAY: u32 = 4;

const PLAN_SYSTEM_PROMPT: &str = r#"Você é um coordenador pedagógico especialista no ENEM.
Monte um cronograma de estudos diário e realista para o estudante, priorizando as matérias em
que ele tem mais dificuldade e intercalando revisões das matérias fortes.

Responda SOMENTE com um objeto JSON no formato:
{
  "activities": [
    {"day": 1, "subject": "Matemática", "topic": "Porcentagem e juros simples",
     "duration_minutes": 60, "difficulty": "medium"}
  ]
}
"day" começa em 1 no primeiro dia do cronograma. "difficulty" é easy, medium ou hard.
"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum PlanError {
    #[error("exam date must be after the start date")]
    ExamNotAfterStart,
}

/// Self-reported student profile.
#[derive(Debug, Clone)]
pub(crate) struct PlanProfile {
    pub(crate) exam_date: Date,
    pub(crate) hours_per_day: u32,
    pub(crate) weak_subjects: Vec<String>,
    pub(crate) strong_subjects: Vec<String>,
    pub(crate) target_score: Option<i32>,
}

impl PlanProfile {
    /// Document stored alongside the plan.
    pub(crate) fn to_document(&self) -> Value {
        json!({
            "exam_date": format_date(self.exam_date),
            "hours_per_day": self.hours_per_day,
            "weak_subjects": self.weak_subjects,
            "strong_subjects": self.strong_subjects,
            "target_score": self.target_score,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlanRange {
    pub(crate) start: Date,
    pub(crate) end: Date,
}

impl PlanRange {
    /// From `start` to the day before the exam, at most 120 days.
    pub(crate) fn new(start: Date, exam_date: Date) -> Result<Self, PlanError> {
        if exam_date <= start {
            return Err(PlanError::ExamNotAfterStart);
        }
        let day_before_exam = exam_date - Duration::days(1);
        // Near the end of the calendar the cap itself is unrepresentable.
        let end = start
            .checked_add(Duration::days(MAX_PLAN_DAYS - 1))
            .map_or(day_before_exam, |cap| day_before_exam.min(cap));
        Ok(Self { start, end })
    }

    pub(crate) fn days(&self) -> u32 {
        ((self.end - self.start).whole_days() + 1) as u32
    }

    pub(crate) fn date_for_day(&self, day: u32) -> Date {
        self.start + Duration::days(i64::from(day.saturating_sub(1)))
    }

    fn day_for_date(&self, date: Date) -> Option<u32> {
        if date < self.start || date > self.end {
            return None;
        }
        Some((date - self.start).whole_days() as u32 + 1)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GeneratedPlan {
    pub(crate) activities: Vec<PlanActivity>,
    /// Model name or `fallback`.
    pub(crate) source: String,
}

pub(crate) fn build_user_prompt(profile: &PlanProfile, range: PlanRange) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "nenhuma informada".to_string()
        } else {
            items.join(", ")
        }
    };
    let target = profile
        .target_score
        .map(|score| format!("Nota desejada: {score}\n"))
        .unwrap_or_default();

    format!(
        "Período: {} a {} ({} dias)\nData da prova: {}\nHoras de estudo por dia: {}\n\
         Matérias com dificuldade: {}\nMatérias fortes: {}\n{target}",
        format_date(range.start),
        format_date(range.end),
        range.days(),
        format_date(profile.exam_date),
        profile.hours_per_day,
        list(&profile.weak_subjects),
        list(&profile.strong_subjects),
    )
}

/// Never fails: a model or parse failure yields the deterministic plan.
pub(crate) async fn generate_plan(
    llm: &LlmClient,
    profile: &PlanProfile,
    range: PlanRange,
) -> GeneratedPlan {
    let prompt = build_user_prompt(profile, range);
    match llm.complete_json(PLAN_SYSTEM_PROMPT, &prompt).await {
        Ok(completion) => {
            let activities = normalize_activities(&completion.output, range);
            if !activities.is_empty() {
                return GeneratedPlan { activities, source: completion.model };
            }
            tracing::warn!(model = %completion.model, "Study plan response had no usable activities");
        }
        Err(err) => {
            tracing::warn!(error = %err, "Study plan generation failed; using rotation plan");
        }
    }

    GeneratedPlan {
        activities: fallback_plan(profile, range),
        source: FALLBACK_SOURCE.to_string(),
    }
}

/// Drops activities without a subject or outside the range, clamps
/// durations and orders by day.
pub(crate) fn normalize_activities(value: &Value, range: PlanRange) -> Vec<PlanActivity> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        other => ["activities", "atividades", "schedule", "cronograma"]
            .iter()
            .find_map(|key| other.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or_default(),
    };

    let mut activities: Vec<PlanActivity> = items
        .iter()
        .filter_map(|item| normalize_activity(item, range))
        .collect();
    activities.sort_by_key(|activity| activity.day);
    activities
}

fn normalize_activity(item: &Value, range: PlanRange) -> Option<PlanActivity> {
    let day = match item.get("day").or_else(|| item.get("dia")) {
        Some(raw) => {
            let day = raw
                .as_u64()
                .or_else(|| raw.as_str().and_then(|text| text.trim().parse::<u64>().ok()))?;
            u32::try_from(day).ok().filter(|day| (1..=range.days()).contains(day))?
        }
        None => item
            .get("date")
            .or_else(|| item.get("data"))
            .and_then(Value::as_str)
            .and_then(parse_date)
            .and_then(|date| range.day_for_date(date))?,
    };

    let subject = text_field(item, &["subject", "materia", "disciplina"])?;
    let topic = text_field(item, &["topic", "topico", "assunto"]).unwrap_or_else(|| subject.clone());

    let minutes = ["duration_minutes", "duration", "duracao", "minutes"]
        .iter()
        .find_map(|key| item.get(*key))
        .and_then(|raw| {
            raw.as_f64()
                .or_else(|| raw.as_str().and_then(|text| text.trim().parse::<f64>().ok()))
        })
        .filter(|minutes| minutes.is_finite())
        .unwrap_or(f64::from(SESSION_MINUTES));

    let difficulty = ["difficulty", "dificuldade"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .and_then(DifficultyLevel::parse_loose)
        .unwrap_or_default();

    Some(PlanActivity {
        day,
        date: format_date(range.date_for_day(day)),
        subject,
        topic,
        duration_minutes: clamp_minutes(minutes),
        difficulty,
        completed: false,
        completed_at: None,
    })
}

fn text_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

pub(crate) fn clamp_minutes(raw: f64) -> u32 {
    raw.round().clamp(f64::from(MIN_ACTIVITY_MINUTES), f64::from(MAX_ACTIVITY_MINUTES)) as u32
}

/// Rotates weak subjects first, then strong ones, splitting the daily hours
/// into at most four sessions.
pub(crate) fn fallback_plan(profile: &PlanProfile, range: PlanRange) -> Vec<PlanActivity> {
    // Weak subjects get medium-level sessions to rebuild the basics; strong
    // ones are practised at hard level.
    let mut rotation: Vec<(String, DifficultyLevel)> = Vec::new();
    for subject in &profile.weak_subjects {
        push_unique(&mut rotation, subject, DifficultyLevel::Medium);
    }
    for subject in &profile.strong_subjects {
        push_unique(&mut rotation, subject, DifficultyLevel::Hard);
    }
    if rotation.is_empty() {
        for area in KnowledgeArea::ALL {
            push_unique(&mut rotation, area.label(), DifficultyLevel::Medium);
        }
    }

    let sessions = profile.hours_per_day.clamp(1, MAX_SESSIONS_PER_DAY);
    let minutes = clamp_minutes(f64::from(profile.hours_per_day * SESSION_MINUTES / sessions));

    let mut activities = Vec::with_capacity((range.days() * sessions) as usize);
    let mut cursor = 0usize;
    for day in 1..=range.days() {
        let date = format_date(range.date_for_day(day));
        for _ in 0..sessions {
            let (subject, difficulty) = &rotation[cursor % rotation.len()];
            cursor += 1;
            activities.push(PlanActivity {
                day,
                date: date.clone(),
                subject: subject.clone(),
                topic: format!("Revisão e exercícios de {subject}"),
                duration_minutes: minutes,
                difficulty: *difficulty,
                completed: false,
                completed_at: None,
            });
        }
    }
    activities
}

fn push_unique(rotation: &mut Vec<(String, DifficultyLevel)>, subject: &str, level: DifficultyLevel) {
    let subject = subject.trim();
    if subject.is_empty() {
        return;
    }
    if rotation.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(subject)) {
        return;
    }
    rotation.push((subject.to_string(), level));
}
