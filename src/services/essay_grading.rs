use serde_json::Value;
use thiserror::Error;

use crate::db::models::CompetencyResult;
use crate::services::llm::LlmClient;
use crate::services::scoring::{clamp_competency, essay_total, COMPETENCY_COUNT};

pub(crate) struct Competency {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
}

pub(crate) const COMPETENCIES: [Competency; COMPETENCY_COUNT] = [
    Competency {
        id: "C1",
        name: "Domínio da norma culta",
        description: "Demonstrar domínio da modalidade escrita formal da língua portuguesa.",
    },
    Competency {
        id: "C2",
        name: "Compreensão da proposta",
        description: "Compreender a proposta e aplicar conceitos das várias áreas do conhecimento \
                      para desenvolver o tema dentro da estrutura do texto dissertativo-argumentativo.",
    },
    Competency {
        id: "C3",
        name: "Organização dos argumentos",
        description: "Selecionar, relacionar, organizar e interpretar informações, fatos, opiniões \
                      e argumentos em defesa de um ponto de vista.",
    },
    Competency {
        id: "C4",
        name: "Coesão textual",
        description: "Demonstrar conhecimento dos mecanismos linguísticos necessários para a \
                      construção da argumentação.",
    },
    Competency {
        id: "C5",
        name: "Proposta de intervenção",
        description: "Elaborar proposta de intervenção para o problema abordado, respeitando os \
                      direitos humanos.",
    },
];

const GRADING_SYSTEM_PROMPT: &str = r#"Você é um corretor experiente da redação do ENEM.
Avalie a redação do estudante nas cinco competências oficiais. Cada competência vale de 0 a 200
pontos, sempre em múltiplos de 20 (0, 20, 40, ..., 200).

Responda SOMENTE com um objeto JSON, sem texto antes ou depois, no formato:
{
  "competencies": [
    {"id": "C1", "score": <número>, "comment": "justificativa curta"},
    {"id": "C2", "score": <número>, "comment": "..."},
    {"id": "C3", "score": <número>, "comment": "..."},
    {"id": "C4", "score": <número>, "comment": "..."},
    {"id": "C5", "score": <número>, "comment": "..."}
  ],
  "strengths": ["ponto forte 1", "ponto forte 2"],
  "improvements": ["melhoria 1", "melhoria 2"],
  "general_comment": "comentário geral para o estudante",
  "corrected_text": "a redação reescrita com os desvios gramaticais corrigidos"
}
"#;

const FALLBACK_COMPETENCY_SCORE: i32 = 120;
const FALLBACK_COMMENT: &str =
    "Não foi possível obter a correção automática agora. Nota estimada provisória.";

#[derive(Debug, Error, PartialEq)]
pub(crate) enum GradeParseError {
    #[error("response has no competency scores")]
    MissingCompetencies,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EssayGrade {
    pub(crate) competencies: Vec<CompetencyResult>,
    pub(crate) total_score: i32,
    pub(crate) strengths: Vec<String>,
    pub(crate) improvements: Vec<String>,
    pub(crate) general_comment: Option<String>,
    pub(crate) corrected_text: Option<String>,
    /// Model that produced the grade; `None` for the static fallback.
    pub(crate) graded_by: Option<String>,
}

impl EssayGrade {
    pub(crate) fn is_fallback(&self) -> bool {
        self.graded_by.is_none()
    }
}

pub(crate) fn build_user_prompt(theme: &str, text: &str) -> String {
    let rubric = COMPETENCIES
        .iter()
        .map(|competency| {
            format!("- {} ({}): {}", competency.id, competency.name, competency.description)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Tema da redação:\n{theme}\n\nCompetências avaliadas:\n{rubric}\n\nRedação do estudante:\n\"\"\"\n{text}\n\"\"\"\n"
    )
}

/// Grades an essay. Never fails: when every model call or the parse fails the
/// static fallback grade is returned and the caller persists it as such.
pub(crate) async fn grade_essay(llm: &LlmClient, theme: &str, text: &str) -> EssayGrade {
    let user_prompt = build_user_prompt(theme, text);

    let completion = match llm.complete_json(GRADING_SYSTEM_PROMPT, &user_prompt).await {
        Ok(completion) => completion,
        Err(err) => {
            tracing::error!(error = %err, "Essay grading call failed; using fallback grade");
            return fallback_grade();
        }
    };

    match parse_grade(&completion.output, &completion.model) {
        Ok(grade) => grade,
        Err(err) => {
            tracing::error!(
                model = %completion.model,
                error = %err,
                "Essay grading response unusable; using fallback grade"
            );
            fallback_grade()
        }
    }
}

pub(crate) fn parse_grade(value: &Value, model: &str) -> Result<EssayGrade, GradeParseError> {
    let raw = value
        .get("competencies")
        .or_else(|| value.get("competencias"))
        .ok_or(GradeParseError::MissingCompetencies)?;

    let mut found: [Option<(f64, String)>; COMPETENCY_COUNT] = Default::default();

    match raw {
        Value::Array(items) => {
            for (position, item) in items.iter().enumerate() {
                let index = item
                    .get("id")
                    .or_else(|| item.get("competencia"))
                    .and_then(competency_index)
                    .or(Some(position))
                    .filter(|index| *index < COMPETENCY_COUNT);
                let Some(index) = index else { continue };
                if found[index].is_some() {
                    continue;
                }
                let score = match item {
                    Value::Object(_) => item.get("score").or_else(|| item.get("nota")),
                    other => Some(other),
                };
                let Some(score) = score.and_then(number_like) else { continue };
                let comment = item
                    .get("comment")
                    .or_else(|| item.get("comentario"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                found[index] = Some((score, comment));
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let Some(index) = competency_index(&Value::String(key.clone())) else { continue };
                let (score, comment) = match item {
                    Value::Object(_) => (
                        item.get("score").or_else(|| item.get("nota")).and_then(number_like),
                        item.get("comment")
                            .or_else(|| item.get("comentario"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .trim()
                            .to_string(),
                    ),
                    other => (number_like(other), String::new()),
                };
                if let Some(score) = score {
                    found[index] = Some((score, comment));
                }
            }
        }
        _ => return Err(GradeParseError::MissingCompetencies),
    }

    if found.iter().all(Option::is_none) {
        return Err(GradeParseError::MissingCompetencies);
    }

    let competencies: Vec<CompetencyResult> = COMPETENCIES
        .iter()
        .zip(found)
        .map(|(competency, entry)| {
            let (score, comment) = entry.unwrap_or((0.0, String::new()));
            CompetencyResult {
                id: competency.id.to_string(),
                name: competency.name.to_string(),
                score: clamp_competency(score),
                comment,
            }
        })
        .collect();

    let scores: Vec<i32> = competencies.iter().map(|competency| competency.score).collect();

    Ok(EssayGrade {
        total_score: essay_total(&scores),
        competencies,
        strengths: string_list(value, &["strengths", "pontos_fortes"]),
        improvements: string_list(value, &["improvements", "pontos_melhoria", "melhorias"]),
        general_comment: non_empty_string(value, &["general_comment", "comentario_geral"]),
        corrected_text: non_empty_string(value, &["corrected_text", "texto_corrigido"]),
        graded_by: Some(model.to_string()),
    })
}

pub(crate) fn fallback_grade() -> EssayGrade {
    let competencies: Vec<CompetencyResult> = COMPETENCIES
        .iter()
        .map(|competency| CompetencyResult {
            id: competency.id.to_string(),
            name: competency.name.to_string(),
            score: FALLBACK_COMPETENCY_SCORE,
            comment: FALLBACK_COMMENT.to_string(),
        })
        .collect();
    let scores: Vec<i32> = competencies.iter().map(|competency| competency.score).collect();

    EssayGrade {
        total_score: essay_total(&scores),
        competencies,
        strengths: vec!["Texto enviado dentro do formato dissertativo-argumentativo.".to_string()],
        improvements: vec![
            "Revise a norma culta e a coesão entre os parágrafos.".to_string(),
            "Detalhe a proposta de intervenção: agente, ação, meio, finalidade e detalhamento."
                .to_string(),
        ],
        general_comment: Some(FALLBACK_COMMENT.to_string()),
        corrected_text: None,
        graded_by: None,
    }
}

/// "C3", "c3", "3", 3 and "Competência 3" all map to index 2.
fn competency_index(value: &Value) -> Option<usize> {
    let number = match value {
        Value::Number(number) => number.as_u64()?,
        Value::String(text) => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<u64>().ok()?
        }
        _ => return None,
    };
    (1..=COMPETENCY_COUNT as u64).contains(&number).then(|| number as usize - 1)
}

fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }
}

fn string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|key| value.get(*key))
        .map(|found| match found {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
            Value::String(text) if !text.trim().is_empty() => vec![text.trim().to_string()],
            _ => Vec::new(),
        })
        .unwrap_or_default()
}

fn non_empty_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AiSettings;
    use crate::services::llm::test_server;
    use serde_json::json;

    #[test]
    fn parses_and_clamps_array_response() {
        let value = json!({
            "competencies": [
                {"id": "C1", "score": 165, "comment": "Poucos desvios."},
                {"id": "C2", "score": "200", "comment": "Tema bem desenvolvido."},
                {"id": "C3", "score": 250},
                {"id": "C4", "score": -10},
                {"id": "C5", "score": 119.9, "comment": "Proposta incompleta."}
            ],
            "strengths": ["Repertório legitimado", "  "],
            "improvements": "Detalhar a proposta",
            "general_comment": "Bom texto.",
            "corrected_text": ""
        });

        let grade = parse_grade(&value, "gpt-test").expect("grade");
        let scores: Vec<i32> = grade.competencies.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![160, 200, 200, 0, 120]);
        assert_eq!(grade.total_score, 680);
        assert_eq!(grade.competencies[0].comment, "Poucos desvios.");
        assert_eq!(grade.competencies[2].comment, "");
        assert_eq!(grade.strengths, vec!["Repertório legitimado".to_string()]);
        assert_eq!(grade.improvements, vec!["Detalhar a proposta".to_string()]);
        assert_eq!(grade.general_comment.as_deref(), Some("Bom texto."));
        assert_eq!(grade.corrected_text, None);
        assert_eq!(grade.graded_by.as_deref(), Some("gpt-test"));
        assert!(!grade.is_fallback());
    }

    #[test]
    fn parses_portuguese_keys_and_object_map() {
        let value = json!({
            "competencias": {
                "c1": {"nota": 140, "comentario": "ok"},
                "Competência 3": 180,
                "C9": 200
            },
            "pontos_fortes": ["Clareza"],
            "texto_corrigido": "Texto revisado."
        });

        let grade = parse_grade(&value, "gemini").expect("grade");
        let scores: Vec<i32> = grade.competencies.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![140, 0, 180, 0, 0]);
        assert_eq!(grade.total_score, 320);
        assert_eq!(grade.strengths, vec!["Clareza".to_string()]);
        assert_eq!(grade.corrected_text.as_deref(), Some("Texto revisado."));
    }

    #[test]
    fn array_without_ids_uses_position() {
        let value = json!({"competencies": [100, 120, 140, 160, 180, 200]});
        let grade = parse_grade(&value, "m").expect("grade");
        let scores: Vec<i32> = grade.competencies.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![100, 120, 140, 160, 180]);
        assert_eq!(grade.total_score, 700);
    }

    #[test]
    fn missing_competencies_is_an_error() {
        assert_eq!(
            parse_grade(&json!({"total": 900}), "m").unwrap_err(),
            GradeParseError::MissingCompetencies
        );
        assert_eq!(
            parse_grade(&json!({"competencies": []}), "m").unwrap_err(),
            GradeParseError::MissingCompetencies
        );
        assert_eq!(
            parse_grade(&json!({"competencies": "alta"}), "m").unwrap_err(),
            GradeParseError::MissingCompetencies
        );
    }

    #[test]
    fn total_is_sum_of_clamped_competencies() {
        let value = json!({"competencies": [
            {"id": "C1", "score": 37}, {"id": "C2", "score": 199},
            {"id": "C3", "score": 81}, {"id": "C4", "score": 1000}, {"id": "C5", "score": "abc"}
        ]});
        let grade = parse_grade(&value, "m").expect("grade");
        let sum: i32 = grade.competencies.iter().map(|c| c.score).sum();
        assert_eq!(grade.total_score, sum);
        assert!((0..=1000).contains(&grade.total_score));
        for competency in &grade.competencies {
            assert_eq!(competency.score % 20, 0);
        }
    }

    #[test]
    fn fallback_grade_is_marked() {
        let grade = fallback_grade();
        assert!(grade.is_fallback());
        assert_eq!(grade.competencies.len(), COMPETENCY_COUNT);
        assert_eq!(grade.total_score, 600);
    }

    #[test]
    fn prompt_contains_theme_text_and_rubric() {
        let prompt = build_user_prompt("Desafios da mobilidade urbana", "Texto do aluno.");
        assert!(prompt.contains("Desafios da mobilidade urbana"));
        assert!(prompt.contains("Texto do aluno."));
        for competency in &COMPETENCIES {
            assert!(prompt.contains(competency.id));
        }
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
    async fn grade_essay_uses_model_output() {
        let base_url = test_server::spawn(
            r#"```json
{"competencies": [{"id": "C1", "score": 200}, {"id": "C2", "score": 180},
 {"id": "C3", "score": 160}, {"id": "C4", "score": 140}, {"id": "C5", "score": 120},],
 "strengths": ["Boa introdução"]}
```"#,
        )
        .await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["broken", "ok"]));

        let grade = grade_essay(&llm, "Tema", "Texto").await;
        assert_eq!(grade.graded_by.as_deref(), Some("ok"));
        assert_eq!(grade.total_score, 800);
    }

    #[tokio::test]
    async fn grade_essay_reads_single_line_fenced_reply() {
        let base_url = test_server::spawn(
            r#"```json {"competencies": [{"id": "C1", "score": 200}, {"id": "C2", "score": 200}, {"id": "C3", "score": 200}, {"id": "C4", "score": 200}, {"id": "C5", "score": 160}]} ```"#,
        )
        .await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["ok"]));

        let grade = grade_essay(&llm, "Tema", "Texto").await;
        assert!(!grade.is_fallback());
        assert_eq!(grade.total_score, 960);
    }

    #[tokio::test]
    async fn grade_essay_falls_back_when_models_fail() {
        let base_url = test_server::spawn("{}").await;
        let llm =
            LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["broken", "garbled"]));

        let grade = grade_essay(&llm, "Tema", "Texto").await;
        assert_eq!(grade, fallback_grade());
    }

    #[tokio::test]
    async fn grade_essay_falls_back_on_unusable_json() {
        let base_url = test_server::spawn("{\"nota\": 900}").await;
        let llm = LlmClient::with_client(reqwest::Client::new(), &ai(&base_url, &["ok"]));

        let grade = grade_essay(&llm, "Tema", "Texto").await;
        assert!(grade.is_fallback());
    }
}
