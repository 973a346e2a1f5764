//! Mock exam generation and scoring.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::db::models::{AreaResult, ExamQuestion, ExamReport};
use crate::db::types::{DifficultyLevel, KnowledgeArea};
use crate::services::llm::{LlmClient, LlmError};
use crate::services::scoring::{area_score, overall_score};

pub(crate) const MIN_OPTIONS: usize = 2;
pub(crate) const MAX_OPTIONS: usize = 5;
pub(crate) const WEAK_AREA_BELOW: i32 = 600;
pub(crate) const STRONG_AREA_FROM: i32 = 750;
pub(crate) const FALLBACK_SOURCE: &str = "fallback";

const OPTION_LETTERS: [char; MAX_OPTIONS] = ['A', 'B', 'C', 'D', 'E'];

const GENERATION_SYSTEM_PROMPT: &str = r#"Você é um elaborador de questões do ENEM.
Crie questões inéditas de múltipla escolha no estilo do ENEM, com enunciado contextualizado e
cinco alternativas (A a E), exatamente uma correta.

Responda SOMENTE com um objeto JSON no formato:
{
  "questions": [
    {
      "area": "matematica",
      "statement": "enunciado completo",
      "options": ["texto da alternativa A", "B", "C", "D", "E"],
      "correct": "C",
      "explanation": "resolução comentada"
    }
  ]
}
Use para "area" um destes códigos: linguagens, ciencias_humanas, ciencias_natureza, matematica.
"#;

const RECOMMENDATION_SYSTEM_PROMPT: &str = r#"Você é um orientador de estudos para o ENEM.
Com base no desempenho do estudante em um simulado, sugira de 3 a 6 ações de estudo concretas,
priorizando as áreas mais fracas.

Responda SOMENTE com um objeto JSON no formato:
{"recommendations": ["recomendação 1", "recomendação 2"]}
"#;

const MAX_RECOMMENDATIONS: usize = 8;

#[derive(Debug, Error)]
pub(crate) enum MockExamError {
    #[error("question generation failed: {0}")]
    Llm(#[from] LlmError),
    #[error("model returned no usable questions")]
    NoValidQuestions,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum AnswerError {
    #[error("received {given} answers for {expected} questions")]
    TooMany { given: usize, expected: usize },
    #[error("answer {position} is not a valid option: {value}")]
    InvalidOption { position: usize, value: String },
}

#[derive(Debug, Clone)]
pub(crate) struct GeneratedExam {
    pub(crate) questions: Vec<ExamQuestion>,
    pub(crate) model: String,
}

pub(crate) fn option_letter(index: usize) -> Option<char> {
    OPTION_LETTERS.get(index).copied()
}

/// "b", "B)", "(B)", "Letra B" and "alternativa b" all resolve to 1.
pub(crate) fn parse_letter(raw: &str) -> Option<usize> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();
    let stripped = lowered
        .strip_prefix("letra")
        .or_else(|| lowered.strip_prefix("alternativa"))
        .unwrap_or(&lowered);
    let core = stripped.trim().trim_start_matches('(').trim_end_matches([')', '.', ':']).trim();

    let mut chars = core.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    OPTION_LETTERS.iter().position(|candidate| candidate.to_ascii_lowercase() == letter)
}

pub(crate) fn exam_title(areas: &[KnowledgeArea], difficulty: DifficultyLevel) -> String {
    let names = areas.iter().map(|area| area.label()).collect::<Vec<_>>().join(", ");
    let level = match difficulty {
        DifficultyLevel::Easy => "fácil",
        DifficultyLevel::Medium => "médio",
        DifficultyLevel::Hard => "difícil",
    };
    format!("Simulado ENEM ({level}): {names}")
}

pub(crate) fn build_generation_prompt(
    areas: &[KnowledgeArea],
    questions_per_area: u32,
    difficulty: DifficultyLevel,
) -> String {
    let listing = areas
        .iter()
        .map(|area| format!("- {} ({}): {questions_per_area} questões", area.label(), area.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Gere um simulado com nível de dificuldade \"{}\".\nÁreas e quantidades:\n{listing}\n",
        difficulty.as_str()
    )
}

pub(crate) async fn generate_exam(
    llm: &LlmClient,
    areas: &[KnowledgeArea],
    questions_per_area: u32,
    difficulty: DifficultyLevel,
) -> Result<GeneratedExam, MockExamError> {
    let prompt = build_generation_prompt(areas, questions_per_area, difficulty);
    let completion = llm.complete_json(GENERATION_SYSTEM_PROMPT, &prompt).await?;

    let questions = normalize_questions(&completion.output, areas, questions_per_area);
    if questions.is_empty() {
        tracing::warn!(model = %completion.model, "Generated exam had no usable questions");
        return Err(MockExamError::NoValidQuestions);
    }

    tracing::info!(
        model = %completion.model,
        questions = questions.len(),
        "Mock exam generated"
    );
    Ok(GeneratedExam { questions, model: completion.model })
}

/// Keeps only well-formed questions for the requested areas, at most
/// `per_area` each, ordered by requested area and renumbered from 1.
pub(crate) fn normalize_questions(
    value: &Value,
    requested: &[KnowledgeArea],
    per_area: u32,
) -> Vec<ExamQuestion> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        other => other
            .get("questions")
            .or_else(|| other.get("questoes"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
    };

    let mut by_area: BTreeMap<usize, Vec<ExamQuestion>> = BTreeMap::new();
    for item in items {
        let Some(question) = normalize_question(item, requested) else { continue };
        let Some(slot) = requested.iter().position(|area| *area == question.area) else {
            continue;
        };
        let bucket = by_area.entry(slot).or_default();
        if bucket.len() < per_area as usize {
            bucket.push(question);
        }
    }

    by_area
        .into_values()
        .flatten()
        .enumerate()
        .map(|(index, mut question)| {
            question.number = index as u32 + 1;
            question
        })
        .collect()
}

fn normalize_question(item: &Value, requested: &[KnowledgeArea]) -> Option<ExamQuestion> {
    let area = match item.get("area").and_then(Value::as_str).and_then(KnowledgeArea::parse_loose) {
        Some(area) if requested.contains(&area) => area,
        Some(_) => return None,
        None if requested.len() == 1 => requested[0],
        None => return None,
    };

    let statement = ["statement", "enunciado", "question", "pergunta"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())?
        .to_string();

    let options = ["options", "alternativas", "alternatives"]
        .iter()
        .find_map(|key| item.get(*key))
        .and_then(option_texts)?;
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return None;
    }

    let correct_option = ["correct", "answer", "resposta", "gabarito", "correct_option"]
        .iter()
        .find_map(|key| item.get(*key))
        .and_then(resolve_option_index)
        .filter(|index| *index < options.len())?;

    let explanation = ["explanation", "explicacao", "resolucao"]
        .iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned);

    Some(ExamQuestion { number: 0, area, statement, options, correct_option, explanation })
}

/// Option texts in their original positions. Any blank or non-text entry
/// rejects the whole list, since dropping it would shift the answer key.
fn option_texts(raw: &Value) -> Option<Vec<String>> {
    let entries: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        // {"A": "...", "B": "..."}; serde_json maps iterate in key order.
        Value::Object(map) => map.values().collect(),
        _ => return None,
    };

    entries
        .into_iter()
        .map(|entry| {
            let text = match entry {
                Value::String(text) => text.as_str(),
                Value::Object(_) => entry.get("text").or_else(|| entry.get("texto"))?.as_str()?,
                _ => return None,
            };
            Some(strip_option_prefix(text)).filter(|text| !text.is_empty())
        })
        .collect()
}

/// Drops a leading "A) ", "(b) " or "C. " label.
fn strip_option_prefix(text: &str) -> String {
    let trimmed = text.trim();
    let without_paren = trimmed.strip_prefix('(').unwrap_or(trimmed);
    let mut chars = without_paren.char_indices();
    if let (Some((_, letter)), Some((sep_index, sep))) = (chars.next(), chars.next()) {
        let is_letter = OPTION_LETTERS.iter().any(|candidate| candidate.eq_ignore_ascii_case(&letter));
        if is_letter && matches!(sep, ')' | '.') {
            let rest = without_paren[sep_index + sep.len_utf8()..].trim();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    trimmed.to_string()
}

/// A letter, or a zero-based index as number or numeric string.
fn resolve_option_index(raw: &Value) -> Option<usize> {
    match raw {
        Value::Number(number) => number.as_u64().map(|index| index as usize),
        Value::String(text) => parse_letter(text).or_else(|| text.trim().parse::<usize>().ok()),
        _ => None,
    }
}

/// Converts submitted letters to option indexes. A short list is padded with
/// blanks; empty strings count as blank.
pub(crate) fn parse_answers(
    raw: &[Option<String>],
    questions: &[ExamQuestion],
) -> Result<Vec<Option<usize>>, AnswerError> {
    if raw.len() > questions.len() {
        return Err(AnswerError::TooMany { given: raw.len(), expected: questions.len() });
    }

    let mut answers = Vec::with_capacity(questions.len());
    for (position, question) in questions.iter().enumerate() {
        let answer = match raw.get(position).and_then(Option::as_deref).map(str::trim) {
            None | Some("") => None,
            Some(letter) => {
                let index = parse_letter(letter)
                    .filter(|index| *index < question.options.len())
                    .ok_or_else(|| AnswerError::InvalidOption {
                        position: position + 1,
                        value: letter.to_string(),
                    })?;
                Some(index)
            }
        };
        answers.push(answer);
    }
    Ok(answers)
}

/// Scores the exam. Recommendations are left empty for the caller to fill.
pub(crate) fn build_report(
    areas: &[KnowledgeArea],
    questions: &[ExamQuestion],
    answers: &[Option<usize>],
) -> ExamReport {
    let mut results: Vec<AreaResult> = areas
        .iter()
        .map(|area| AreaResult { area: *area, total: 0, correct: 0, incorrect: 0, blank: 0, score: 0 })
        .collect();

    for (position, question) in questions.iter().enumerate() {
        let Some(result) = results.iter_mut().find(|result| result.area == question.area) else {
            continue;
        };
        result.total += 1;
        match answers.get(position).copied().flatten() {
            None => result.blank += 1,
            Some(choice) if choice == question.correct_option => result.correct += 1,
            Some(_) => result.incorrect += 1,
        }
    }

    results.retain(|result| result.total > 0);
    for result in &mut results {
        result.score = area_score(result.correct, result.total);
    }

    let scores: Vec<i32> = results.iter().map(|result| result.score).collect();
    ExamReport {
        correct: results.iter().map(|result| result.correct).sum(),
        incorrect: results.iter().map(|result| result.incorrect).sum(),
        blank: results.iter().map(|result| result.blank).sum(),
        overall_score: overall_score(&scores),
        weak_areas: results
            .iter()
            .filter(|result| result.score < WEAK_AREA_BELOW)
            .map(|result| result.area)
            .collect(),
        strong_areas: results
            .iter()
            .filter(|result| result.score >= STRONG_AREA_FROM)
            .map(|result| result.area)
            .collect(),
        areas: results,
        recommendations: Vec::new(),
        recommendations_source: String::new(),
    }
}

pub(crate) fn build_recommendation_prompt(report: &ExamReport) -> String {
    let lines = report
        .areas
        .iter()
        .map(|result| {
            format!(
                "- {}: {} acertos, {} erros, {} em branco de {} (nota {})",
                result.area.label(),
                result.correct,
                result.incorrect,
                result.blank,
                result.total,
                result.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Desempenho por área:\n{lines}\nNota geral: {}\n", report.overall_score)
}

/// Fills `report.recommendations` from the model, or with the canned list.
pub(crate) async fn attach_recommendations(llm: &LlmClient, report: &mut ExamReport) {
    let prompt = build_recommendation_prompt(report);
    let parsed = match llm.complete_json(RECOMMENDATION_SYSTEM_PROMPT, &prompt).await {
        Ok(completion) => {
            let items = parse_recommendations(&completion.output);
            if items.is_empty() {
                tracing::warn!(model = %completion.model, "Recommendation response had no items");
                None
            } else {
                Some((items, completion.model))
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "Recommendation call failed; using canned list");
            None
        }
    };

    let (items, source) =
        parsed.unwrap_or_else(|| (fallback_recommendations(report), FALLBACK_SOURCE.to_string()));
    report.recommendations = items;
    report.recommendations_source = source;
}

pub(crate) fn parse_recommendations(value: &Value) -> Vec<String> {
    let list = match value {
        Value::Array(items) => Some(items),
        other => other
            .get("recommendations")
            .or_else(|| other.get("recomendacoes"))
            .and_then(Value::as_array),
    };
    list.map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .take(MAX_RECOMMENDATIONS)
            .map(ToOwned::to_owned)
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn fallback_recommendations(report: &ExamReport) -> Vec<String> {
    let mut items: Vec<String> = report
        .weak_areas
        .iter()
        .map(|area| {
            format!(
                "Revise os conteúdos básicos de {} e resolva questões de provas anteriores.",
                area.label()
            )
        })
        .collect();
    items.push("Refaça as questões que você errou e leia a resolução comentada de cada uma.".to_string());
    items.push("Faça um novo simulado cronometrado na próxima semana para medir a evolução.".to_string());
    items.push("Distribua a revisão ao longo da semana em blocos curtos e frequentes.".to_string());
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AiSettings;
    use crate::services::llm::test_server;
    use serde_json::json;

    fn question(area: KnowledgeArea, correct: usize) -> ExamQuestion {
        ExamQuestion {
            number: 0,
            area,
            statement: "Enunciado".to_string(),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            correct_option: correct,
            explanation: None,
        }
    }

    #[test]
    fn parse_letter_accepts_common_shapes() {
        assert_eq!(parse_letter("A"), Some(0));
        assert_eq!(parse_letter("b"), Some(1));
        assert_eq!(parse_letter(" (C) "), Some(2));
        assert_eq!(parse_letter("D)"), Some(3));
        assert_eq!(parse_letter("Letra E"), Some(4));
        assert_eq!(parse_letter("alternativa a"), Some(0));
        assert_eq!(parse_letter("F"), None);
        assert_eq!(parse_letter("AB"), None);
        assert_eq!(parse_letter(""), None);
    }

    #[test]
    fn normalize_resolves_letters_and_indexes() {
        let requested = [KnowledgeArea::Matematica, KnowledgeArea::Linguagens];
        let value = json!({"questions": [
            {"area": "Matemática", "statement": "2+2?", "options": ["A) 3", "B) 4", "C) 5"], "correct": "B"},
            {"area": "linguagens", "enunciado": "Figura de linguagem?",
             "alternativas": {"A": "Metáfora", "B": "Ironia"}, "resposta": 0,
             "explicacao": "É uma metáfora."},
            {"area": "matematica", "statement": "Sem opção correta", "options": ["1", "2"], "correct": "D"},
            {"area": "matematica", "statement": "Opções demais",
             "options": ["1", "2", "3", "4", "5", "6"], "correct": "A"},
            {"area": "matematica", "statement": "", "options": ["1", "2"], "correct": "A"}
        ]});

        let questions = normalize_questions(&value, &requested, 10);
        assert_eq!(questions.len(), 2);

        assert_eq!(questions[0].number, 1);
        assert_eq!(questions[0].area, KnowledgeArea::Matematica);
        assert_eq!(questions[0].options, vec!["3", "4", "5"]);
        assert_eq!(questions[0].correct_option, 1);

        assert_eq!(questions[1].number, 2);
        assert_eq!(questions[1].area, KnowledgeArea::Linguagens);
        assert_eq!(questions[1].options, vec!["Metáfora", "Ironia"]);
        assert_eq!(questions[1].correct_option, 0);
        assert_eq!(questions[1].explanation.as_deref(), Some("É uma metáfora."));
    }

    #[test]
    fn normalize_drops_questions_with_blank_options() {
        let value = json!({"questions": [
            {"area": "matematica", "statement": "2+3?", "options": ["A) 4", "", "C) 5", "D) 6"], "correct": "C"},
            {"area": "matematica", "statement": "2+4?", "options": ["4", {"texto": " "}, "6"], "correct": 2},
            {"area": "matematica", "statement": "2+5?", "options": ["7", null, "8"], "correct": "A"},
            {"area": "matematica", "statement": "2+6?", "options": ["A) 7", "B) 8", "C) 9"], "correct": "B"}
        ]});

        let questions = normalize_questions(&value, &[KnowledgeArea::Matematica], 10);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].statement, "2+6?");
        assert_eq!(questions[0].options[questions[0].correct_option], "8");
    }

    #[test]
    fn normalize_handles_unknown_areas() {
        let item = |area: Value| {
            json!({"area": area, "statement": "Q", "options": ["x", "y"], "correct": "A"})
        };
        let value = json!([item(json!("astrologia")), item(Value::Null), item(json!("historia"))]);

        let single = normalize_questions(&value, &[KnowledgeArea::CienciasHumanas], 10);
        assert_eq!(single.len(), 3);
        assert!(single.iter().all(|question| question.area == KnowledgeArea::CienciasHumanas));

        let several = normalize_questions(
            &value,
            &[KnowledgeArea::CienciasHumanas, KnowledgeArea::Matematica],
            10,
        );
        assert!(several.is_empty());
    }

    #[test]
    fn normalize_drops_areas_not_requested_and_caps_per_area() {
        let mut items = vec![
            json!({"area": "matematica", "statement": "Q", "options": ["x", "y"], "correct": 1});
            5
        ];
        items.push(json!({"area": "linguagens", "statement": "Q", "options": ["x", "y"], "correct": 1}));
        let value = json!({ "questions": items });

        let questions = normalize_questions(&value, &[KnowledgeArea::Matematica], 3);
        assert_eq!(questions.len(), 3);
        let numbers: Vec<u32> = questions.iter().map(|question| question.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn parse_answers_pads_and_validates() {
        let mut short = question(KnowledgeArea::Matematica, 0);
        short.options.truncate(3);
        let questions = vec![
            question(KnowledgeArea::Matematica, 0),
            short,
            question(KnowledgeArea::Matematica, 4),
        ];

        let answers = parse_answers(&[Some("e".to_string()), Some(" ".to_string())], &questions)
            .expect("answers");
        assert_eq!(answers, vec![Some(4), None, None]);

        assert_eq!(
            parse_answers(&[None, Some("D".to_string())], &questions),
            Err(AnswerError::InvalidOption { position: 2, value: "D".to_string() })
        );
        assert_eq!(
            parse_answers(&[None, None, None, None], &questions),
            Err(AnswerError::TooMany { given: 4, expected: 3 })
        );
    }

    #[test]
    fn report_scores_each_area() {
        let areas = [KnowledgeArea::Matematica, KnowledgeArea::Linguagens, KnowledgeArea::CienciasNatureza];
        let questions = vec![
            question(KnowledgeArea::Matematica, 0),
            question(KnowledgeArea::Matematica, 1),
            question(KnowledgeArea::Linguagens, 2),
            question(KnowledgeArea::Linguagens, 3),
        ];
        let answers = vec![Some(0), Some(1), Some(0), None];

        let report = build_report(&areas, &questions, &answers);
        assert_eq!(report.areas.len(), 2);

        let math = &report.areas[0];
        assert_eq!((math.total, math.correct, math.incorrect, math.blank), (2, 2, 0, 0));
        assert_eq!(math.score, 1000);

        let languages = &report.areas[1];
        assert_eq!((languages.total, languages.correct, languages.incorrect, languages.blank), (2, 0, 1, 1));
        assert_eq!(languages.score, 300);

        assert_eq!((report.correct, report.incorrect, report.blank), (2, 1, 1));
        assert_eq!(report.overall_score, 650);
        assert_eq!(report.weak_areas, vec![KnowledgeArea::Linguagens]);
        assert_eq!(report.strong_areas, vec![KnowledgeArea::Matematica]);
    }

    #[test]
    fn report_threshold_boundaries() {
        // 3 of 7 correct -> 600 (not weak); 5 of 7 -> 800 (strong).
        let mut questions = Vec::new();
        let mut answers = Vec::new();
        for index in 0..7 {
            questions.push(question(KnowledgeArea::Matematica, 0));
            answers.push(Some(if index < 3 { 0 } else { 1 }));
        }
        for index in 0..7 {
            questions.push(question(KnowledgeArea::Linguagens, 0));
            answers.push(Some(if index < 5 { 0 } else { 1 }));
        }

        let report = build_report(
            &[KnowledgeArea::Matematica, KnowledgeArea::Linguagens],
            &questions,
            &answers,
        );
        assert_eq!(report.areas[0].score, 600);
        assert_eq!(report.areas[1].score, 800);
        assert!(report.weak_areas.is_empty());
        assert_eq!(report.strong_areas, vec![KnowledgeArea::Linguagens]);
    }

    #[test]
    fn fallback_recommendations_mention_weak_areas() {
        let report = build_report(
            &[KnowledgeArea::CienciasHumanas],
            &[question(KnowledgeArea::CienciasHumanas, 0)],
            &[None],
        );
        let items = fallback_recommendations(&report);
        assert!(items[0].contains(KnowledgeArea::CienciasHumanas.label()));
        assert!(items.len() >= 3);
    }

    #[test]
    fn parse_recommendations_accepts_object_or_array() {
        assert_eq!(
            parse_recommendations(&json!({"recommendations": ["Estude funções", " ", 3]})),
            vec!["Estude funções".to_string()]
        );
        assert_eq!(parse_recommendations(&json!(["Leia mais"])), vec!["Leia mais".to_string()]);
        assert!(parse_recommendations(&json!({"dicas": ["x"]})).is_empty());
    }

    #[test]
    fn title_lists_areas() {
        let title = exam_title(&[KnowledgeArea::Matematica], DifficultyLevel::Hard);
        assert_eq!(title, "Simulado ENEM (difícil): Matemática e suas Tecnologias");
    }

    fn ai(base_url: &str, models: &[&str]) -> AiSettings {
        AiSettings {
            openai_api_key: "test-key".to_string(),
            openai_base_url: base_url.to_string(),
            models: models.iter().map(|model| model.to_string()).collect(),
            max_tokens: 256,
            temperature: 0.2,
            request_timeout: 5,
        }
    }

    #[tokio::test]
    async fn generate_exam_rejects_empty_question_list() {
        let base_url = test_server::spawn(r#"{"questions": [{"statement": "sem opções"}]}"#).await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["ok"]));

        let err = generate_exam(&llm, &[KnowledgeArea::Matematica], 2, DifficultyLevel::Medium)
            .await
            .unwrap_err();
        assert!(matches!(err, MockExamError::NoValidQuestions));
    }

    #[tokio::test]
    async fn generate_exam_returns_normalized_questions() {
        let base_url = test_server::spawn(
            r#"{"questions": [{"statement": "Quanto é 3x3?", "options": ["6", "9"], "correct": "B"}]}"#,
        )
        .await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["ok"]));

        let exam = generate_exam(&llm, &[KnowledgeArea::Matematica], 2, DifficultyLevel::Easy)
            .await
            .expect("exam");
        assert_eq!(exam.model, "ok");
        assert_eq!(exam.questions.len(), 1);
        assert_eq!(exam.questions[0].area, KnowledgeArea::Matematica);
        assert_eq!(exam.questions[0].correct_option, 1);
    }

    #[tokio::test]
    async fn generate_exam_accepts_bare_question_array() {
        let base_url = test_server::spawn(
            "```json [{\"statement\": \"Quanto é 2x5?\", \"options\": [\"10\", \"7\"], \"correct\": \"A\"}] ```",
        )
        .await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["ok"]));

        let exam = generate_exam(&llm, &[KnowledgeArea::Matematica], 3, DifficultyLevel::Easy)
            .await
            .expect("exam");
        assert_eq!(exam.questions.len(), 1);
        assert_eq!(exam.questions[0].options[exam.questions[0].correct_option], "10");
    }

    #[tokio::test]
    async fn recommendations_fall_back_when_model_fails() {
        let base_url = test_server::spawn("{}").await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["broken"]));
        let mut report = build_report(
            &[KnowledgeArea::Matematica],
            &[question(KnowledgeArea::Matematica, 0)],
            &[Some(1)],
        );

        attach_recommendations(&llm, &mut report).await;
        assert_eq!(report.recommendations_source, FALLBACK_SOURCE);
        assert_eq!(report.recommendations, fallback_recommendations(&report));
    }

    #[tokio::test]
    async fn recommendations_come_from_model() {
        let base_url = test_server::spawn(r#"{"recommendations": ["Revise frações"]}"#).await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["ok"]));
        let mut report = build_report(
            &[KnowledgeArea::Matematica],
            &[question(KnowledgeArea::Matematica, 0)],
            &[Some(0)],
        );

        attach_recommendations(&llm, &mut report).await;
        assert_eq!(report.recommendations_source, "ok");
        assert_eq!(report.recommendations, vec!["Revise frações".to_string()]);
    }
}
