//! Client for an OpenAI-compatible `chat/completions` endpoint.
//!
//! Models are tried in the configured order; a transport error, a non-2xx
//! status, empty content or (for JSON calls) output that cannot be parsed moves
//! on to the next model. Contents and the API key are never logged.

use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::config::{AiSettings, Settings};

const ERROR_BODY_PREVIEW: usize = 300;

#[derive(Debug, Error)]
pub(crate) enum LlmError {
    #[error("model API key is not configured")]
    NotConfigured,
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned empty content")]
    EmptyContent,
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("all {attempts} model(s) failed; last error: {last_error}")]
    Exhausted { attempts: usize, last_error: Box<LlmError> },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: &'static str,
    pub(crate) content: String,
}

impl ChatMessage {
    pub(crate) fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub(crate) fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }

    pub(crate) fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant", content: content.into() }
    }
}

/// A successful call: the model that answered and the accepted output.
#[derive(Debug, Clone)]
pub(crate) struct Completion<T> {
    pub(crate) model: String,
    pub(crate) output: T,
    pub(crate) tokens_used: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    models: Vec<String>,
    max_tokens: u32,
    temperature: f64,
}

impl LlmClient {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let ai = settings.ai();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(ai.request_timeout))
            .user_agent(concat!("enem-mentor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_client(client, ai))
    }

    pub(crate) fn with_client(client: Client, ai: &AiSettings) -> Self {
        Self {
            client,
            api_key: ai.openai_api_key.clone(),
            base_url: ai.openai_base_url.trim_end_matches('/').to_string(),
            models: ai.models.clone(),
            max_tokens: ai.max_tokens,
            temperature: ai.temperature,
        }
    }

    pub(crate) fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.models.is_empty()
    }

    /// Plain-text completion; empty answers count as failures.
    pub(crate) async fn complete_text(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Completion<String>, LlmError> {
        self.run(messages, false, |content| Ok(content.trim().to_string())).await
    }

    /// JSON completion. The raw text goes through [`extract_json_object`] (or
    /// the array equivalent when the reply opens with `[`) before parsing.
    pub(crate) async fn complete_json(
        &self,
        system: &str,
        user: &str,
    ) -> Result<Completion<Value>, LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        self.run(&messages, true, parse_json_reply).await
    }

    async fn run<T>(
        &self,
        messages: &[ChatMessage],
        json_mode: bool,
        accept: impl Fn(&str) -> Result<T, LlmError>,
    ) -> Result<Completion<T>, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured);
        }

        let mut last_error = None;
        for model in &self.models {
            let started = Instant::now();
            let outcome = match self.call_model(model, messages, json_mode).await {
                Ok((content, tokens_used)) => {
                    accept(&content).map(|output| (output, tokens_used))
                }
                Err(err) => Err(err),
            };
            let elapsed = started.elapsed().as_secs_f64();
            metrics::histogram!("llm_request_duration_seconds", "model" => model.clone())
                .record(elapsed);

            match outcome {
                Ok((output, tokens_used)) => {
                    metrics::counter!(
                        "llm_requests_total",
                        "model" => model.clone(),
                        "status" => "success"
                    )
                    .increment(1);
                    tracing::info!(
                        model = %model,
                        duration_seconds = elapsed,
                        tokens_used = tokens_used,
                        "Model call completed"
                    );
                    return Ok(Completion { model: model.clone(), output, tokens_used });
                }
                Err(err) => {
                    metrics::counter!(
                        "llm_requests_total",
                        "model" => model.clone(),
                        "status" => "failed"
                    )
                    .increment(1);
                    tracing::warn!(
                        model = %model,
                        duration_seconds = elapsed,
                        error = %err,
                        "Model call failed, trying next model"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last_error) => Err(LlmError::Exhausted {
                attempts: self.models.len(),
                last_error: Box::new(last_error),
            }),
            None => Err(LlmError::NotConfigured),
        }
    }

    async fn call_model(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_mode: bool,
    ) -> Result<(String, Option<u64>), LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: json_mode.then_some(ResponseFormat { r#type: "json_object" }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| LlmError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body: preview(&body) });
        }

        let body: ChatCompletionResponse =
            response.json().await.map_err(|err| LlmError::Request(err.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyContent)?;

        Ok((content, body.usage.and_then(|usage| usage.total_tokens)))
    }
}

/// Pulls a JSON object out of model output: strips markdown fences, keeps the
/// span from the first `{` to the last `}` and drops trailing commas that sit
/// outside string literals.
pub(crate) fn extract_json_object(raw: &str) -> Option<String> {
    let unfenced = strip_code_fences(raw);
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(remove_trailing_commas(&unfenced[start..=end]))
}

/// Same cleanup for a top-level array: first `[` to last `]`.
pub(crate) fn extract_json_array(raw: &str) -> Option<String> {
    let unfenced = strip_code_fences(raw);
    let start = unfenced.find('[')?;
    let end = unfenced.rfind(']')?;
    if end < start {
        return None;
    }
    Some(remove_trailing_commas(&unfenced[start..=end]))
}

fn parse_json_reply(content: &str) -> Result<Value, LlmError> {
    let unfenced = strip_code_fences(content);
    let opens_with_array = match (unfenced.find('['), unfenced.find('{')) {
        (Some(bracket), Some(brace)) => bracket < brace,
        (Some(_), None) => true,
        _ => false,
    };

    if opens_with_array {
        let parsed = extract_json_array(content)
            .and_then(|cleaned| serde_json::from_str::<Value>(&cleaned).ok());
        if let Some(value) = parsed {
            return Ok(value);
        }
    }

    let cleaned = extract_json_object(content)
        .ok_or_else(|| LlmError::InvalidJson("no JSON object in response".to_string()))?;
    serde_json::from_str::<Value>(&cleaned).map_err(|err| LlmError::InvalidJson(err.to_string()))
}

/// Removes the fence markers (with an optional language tag after the opening
/// one) and keeps everything else, so single-line fenced replies survive.
fn strip_code_fences(raw: &str) -> String {
    let mut segments = raw.split("```");
    let mut out = segments.next().unwrap_or_default().to_string();
    for segment in segments {
        out.push_str(segment.trim_start_matches(|ch: char| ch.is_ascii_alphanumeric()));
    }
    out
}

fn remove_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[idx + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

fn preview(body: &str) -> String {
    let mut preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
    if body.chars().count() > ERROR_BODY_PREVIEW {
        preview.push('…');
    }
    preview
}

#[cfg(test)]
pub(crate) mod test_server {
    use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Answers `chat/completions` according to the requested model name:
    /// `broken` fails with 500, `garbled` returns prose, `empty` returns no
    /// content, anything else echoes the configured reply.
    pub(crate) async fn spawn(reply: &'static str) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<Value>| async move {
                let model = body["model"].as_str().unwrap_or_default().to_string();
                match model.as_str() {
                    "broken" => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
                    }
                    "garbled" => Json(completion("I'm sorry, I cannot help with that."))
                        .into_response(),
                    "empty" => Json(completion("   ")).into_response(),
                    _ => Json(completion(reply)).into_response(),
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}/v1")
    }

    fn completion(content: &str) -> Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"total_tokens": 42}
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ai_settings(base_url: &str, models: &[&str]) -> AiSettings {
        AiSettings {
            openai_api_key: "test-key".to_string(),
            openai_base_url: base_url.to_string(),
            models: models.iter().map(|model| model.to_string()).collect(),
            max_tokens: 256,
            temperature: 0.2,
            request_timeout: 5,
        }
    }

    #[test]
    fn extract_strips_fences_and_prose() {
        let raw = "Claro! Aqui está:\n```json\n{\"total\": 880}\n```\nBons estudos.";
        assert_eq!(extract_json_object(raw).as_deref(), Some("{\"total\": 880}"));
    }

    #[test]
    fn extract_handles_single_line_fence() {
        let raw = "```json {\"competencies\": [200, 160, 180, 200, 120]} ```";
        let cleaned = extract_json_object(raw).expect("json");
        let value: Value = serde_json::from_str(&cleaned).expect("parse");
        assert_eq!(value["competencies"][4], 120);

        let bare = "```{\"ok\": true}```";
        assert_eq!(extract_json_object(bare).as_deref(), Some("{\"ok\": true}"));
    }

    #[test]
    fn reply_parser_accepts_top_level_arrays() {
        let value = parse_json_reply("```json\n[{\"a\": 1}, {\"a\": 2},]\n```").expect("array");
        assert_eq!(value.as_array().map(Vec::len), Some(2));

        let object = parse_json_reply("Veja [nota]: {\"a\": 1}").expect("object");
        assert_eq!(object["a"], 1);

        assert!(matches!(parse_json_reply("nada"), Err(LlmError::InvalidJson(_))));
    }

    #[test]
    fn extract_keeps_nested_objects() {
        let raw = "{\"a\": {\"b\": [1, 2]}, \"c\": \"}\"}";
        let cleaned = extract_json_object(raw).expect("json");
        let value: Value = serde_json::from_str(&cleaned).expect("parse");
        assert_eq!(value["a"]["b"][1], 2);
        assert_eq!(value["c"], "}");
    }

    #[test]
    fn extract_removes_trailing_commas_outside_strings() {
        let raw = "{\"items\": [1, 2, ], \"text\": \"a, ]\", }";
        let cleaned = extract_json_object(raw).expect("json");
        assert_eq!(cleaned, "{\"items\": [1, 2 ], \"text\": \"a, ]\" }");
        assert!(serde_json::from_str::<Value>(&cleaned).is_ok());
    }

    #[test]
    fn extract_handles_escaped_quotes() {
        let raw = r#"{"quote": "ele disse \"oi,\" e saiu",}"#;
        let cleaned = extract_json_object(raw).expect("json");
        let value: Value = serde_json::from_str(&cleaned).expect("parse");
        assert_eq!(value["quote"], "ele disse \"oi,\" e saiu");
    }

    #[test]
    fn extract_rejects_text_without_object() {
        assert_eq!(extract_json_object("sem json aqui"), None);
        assert_eq!(extract_json_object("} invertido {"), None);
    }

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(ERROR_BODY_PREVIEW + 10);
        let shortened = preview(&body);
        assert_eq!(shortened.chars().count(), ERROR_BODY_PREVIEW + 1);
        assert!(shortened.ends_with('…'));
    }

    #[tokio::test]
    async fn unconfigured_client_fails_fast() {
        let mut ai = ai_settings("http://127.0.0.1:1/v1", &["gpt"]);
        ai.openai_api_key.clear();
        let client = LlmClient::with_client(Client::new(), &ai);
        let err = client.complete_json("sys", "user").await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));
    }

    #[tokio::test]
    async fn json_call_falls_through_failing_models() {
        let base_url = test_server::spawn("```json\n{\"ok\": true,}\n```").await;
        let client = LlmClient::with_client(
            Client::new(),
            &ai_settings(&base_url, &["broken", "garbled", "empty", "good"]),
        );

        let completion = client.complete_json("sys", "user").await.expect("completion");
        assert_eq!(completion.model, "good");
        assert_eq!(completion.output["ok"], true);
        assert_eq!(completion.tokens_used, Some(42));
    }

    #[tokio::test]
    async fn text_call_uses_first_working_model() {
        let base_url = test_server::spawn("  Estude funções afins hoje.  ").await;
        let client =
            LlmClient::with_client(Client::new(), &ai_settings(&base_url, &["primary", "backup"]));

        let completion =
            client.complete_text(&[ChatMessage::user("oi")]).await.expect("completion");
        assert_eq!(completion.model, "primary");
        assert_eq!(completion.output, "Estude funções afins hoje.");
    }

    #[tokio::test]
    async fn exhausted_models_report_last_error() {
        let base_url = test_server::spawn("{}").await;
        let client =
            LlmClient::with_client(Client::new(), &ai_settings(&base_url, &["broken", "garbled"]));

        let err = client.complete_json("sys", "user").await.unwrap_err();
        match err {
            LlmError::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last_error, LlmError::InvalidJson(_)), "{last_error}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_content_is_reported_as_empty() {
        let base_url = test_server::spawn("{}").await;
        let client = LlmClient::with_client(Client::new(), &ai_settings(&base_url, &["empty"]));

        let err = client.complete_text(&[ChatMessage::user("oi")]).await.unwrap_err();
        match err {
            LlmError::Exhausted { attempts: 1, last_error } => {
                assert!(matches!(*last_error, LlmError::EmptyContent));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn broken_model_reports_http_status() {
        let base_url = test_server::spawn("{}").await;
        let client = LlmClient::with_client(Client::new(), &ai_settings(&base_url, &["broken"]));

        let err = client.complete_json("sys", "user").await.unwrap_err();
        match err {
            LlmError::Exhausted { last_error, .. } => {
                assert!(matches!(*last_error, LlmError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_exhausted() {
        let client = LlmClient::with_client(
            Client::new(),
            &ai_settings("http://127.0.0.1:1/v1", &["a", "b"]),
        );
        let err = client.complete_text(&[ChatMessage::user("oi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::Exhausted { attempts: 2, .. }));
    }
}
