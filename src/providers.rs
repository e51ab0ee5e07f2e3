//! Chat-completion providers.
//!
//! Defines the [`ChatProvider`] trait and three HTTP implementations:
//! - **OpenAI**: `POST /v1/chat/completions`, bearer auth.
//! - **Anthropic**: `POST /v1/messages`, `x-api-key` auth; system messages
//!   are lifted into the top-level `system` field.
//! - **Gemini**: `POST /v1beta/models/{model}:generateContent?key=...`;
//!   assistant turns use the `model` role and system messages become
//!   `systemInstruction`.
//!
//! Every provider can also list its model catalogue, filtered to models
//! that are usable for chat.
//!
//! # Errors
//!
//! A non-2xx response fails with `"<Label> request failed: <detail>"`, where
//! `detail` is the first of `error` (string), `message`, or `error.message`
//! found in the response body, else `HTTP <status>`. A successful response
//! without any text content is also an error.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use linkrag_core::prompt::{ChatMessage, ChatRole};

const ANTHROPIC_VERSION: &str = "2023-06-01";

const OPENAI_BLOCKED_FRAGMENTS: &[&str] = &[
    "instruct",
    "whisper",
    "tts",
    "speech",
    "audio",
    "image",
    "search",
    "realtime",
    "transcribe",
    "transcription",
    "embedding",
    "moderation",
    "text-",
    "dall-e",
    "dalle",
    "sora",
    "davinci",
    "babbage",
    "curie",
    "ada",
];

const OPENAI_CHAT_PREFIXES: &[&str] = &["gpt-4", "gpt-5", "gpt-3.5", "gpt-oss", "chatgpt-"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
}

impl ProviderName {
    pub const ALL: [ProviderName; 3] = [
        ProviderName::OpenAi,
        ProviderName::Anthropic,
        ProviderName::Gemini,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "openai",
            ProviderName::Anthropic => "anthropic",
            ProviderName::Gemini => "gemini",
        }
    }

    /// Human-readable label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "OpenAI",
            ProviderName::Anthropic => "Claude (Anthropic)",
            ProviderName::Gemini => "Gemini (Google)",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "gpt-4.1-mini",
            ProviderName::Anthropic => "claude-3-5-sonnet-latest",
            ProviderName::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "OPENAI_API_KEY",
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            ProviderName::OpenAi => "https://api.openai.com",
            ProviderName::Anthropic => "https://api.anthropic.com",
            ProviderName::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderName::OpenAi),
            "anthropic" | "claude" => Ok(ProviderName::Anthropic),
            "gemini" | "google" => Ok(ProviderName::Gemini),
            other => Err(format!(
                "unknown provider '{}'. Must be openai, anthropic, or gemini.",
                other
            )),
        }
    }
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Generate the assistant's reply to `request.messages`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Chat-capable model ids, trimmed, de-duplicated and sorted.
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Shared HTTP plumbing for the concrete providers.
struct HttpProvider {
    name: ProviderName,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpProvider {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value> {
        let response = builder
            .send()
            .await
            .map_err(|e| anyhow!("{} request failed: {}", self.name.label(), e))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let data: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if !status.is_success() {
            let detail =
                error_detail(&data).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            bail!("{} request failed: {}", self.name.label(), detail);
        }
        Ok(data)
    }
}

pub struct OpenAiProvider(HttpProvider);
pub struct AnthropicProvider(HttpProvider);
pub struct GeminiProvider(HttpProvider);

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> ProviderName {
        ProviderName::OpenAi
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let http = &self.0;
        let data = http
            .send(
                http.client
                    .post(http.endpoint("/v1/chat/completions"))
                    .bearer_auth(&http.api_key)
                    .json(&openai_body(request)),
            )
            .await?;
        openai_text(&data)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let http = &self.0;
        let data = http
            .send(
                http.client
                    .get(http.endpoint("/v1/models"))
                    .bearer_auth(&http.api_key),
            )
            .await?;
        let ids = model_ids(data.get("data"))
            .into_iter()
            .filter(|id| is_likely_chat_model(id))
            .collect();
        Ok(unique_sorted(ids))
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Anthropic
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let http = &self.0;
        let data = http
            .send(
                http.client
                    .post(http.endpoint("/v1/messages"))
                    .header("x-api-key", &http.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&anthropic_body(request)),
            )
            .await?;
        anthropic_text(&data)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let http = &self.0;
        let data = http
            .send(
                http.client
                    .get(http.endpoint("/v1/models"))
                    .header("x-api-key", &http.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION),
            )
            .await?;
        Ok(unique_sorted(model_ids(data.get("data"))))
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Gemini
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let http = &self.0;
        let mut url = reqwest::Url::parse(&http.endpoint("/v1beta/models/"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid Gemini base URL: {}", http.base_url))?
            .pop_if_empty()
            .push(&format!("{}:generateContent", request.model));
        url.query_pairs_mut().append_pair("key", &http.api_key);

        let data = http
            .send(http.client.post(url).json(&gemini_body(request)))
            .await?;
        gemini_text(&data)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let http = &self.0;
        let mut url = reqwest::Url::parse(&http.endpoint("/v1/models"))?;
        url.query_pairs_mut().append_pair("key", &http.api_key);
        let data = http.send(http.client.get(url)).await?;
        Ok(unique_sorted(gemini_model_ids(data.get("models"))))
    }
}

/// Build the provider named `name` from its `[providers.<name>]` section.
///
/// Fails when no API key is available.
pub fn create_provider(config: &Config, name: ProviderName) -> Result<Box<dyn ChatProvider>> {
    let settings = config.providers.get(name);
    let api_key = settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            anyhow!(
                "API key is required for {} (set {} or [providers.{}].api_key)",
                name.label(),
                settings
                    .api_key_env
                    .as_deref()
                    .unwrap_or(name.default_api_key_env()),
                name
            )
        })?
        .to_string();

    let base_url = settings
        .base_url
        .as_deref()
        .unwrap_or(name.default_base_url())
        .trim_end_matches('/')
        .to_string();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.chat.timeout_secs))
        .build()?;

    let http = HttpProvider {
        name,
        client,
        api_key,
        base_url,
    };

    Ok(match name {
        ProviderName::OpenAi => Box::new(OpenAiProvider(http)),
        ProviderName::Anthropic => Box::new(AnthropicProvider(http)),
        ProviderName::Gemini => Box::new(GeminiProvider(http)),
    })
}

/// Run one completion, abandoning it if `cancel` fires first.
pub async fn complete_with_cancel(
    provider: &dyn ChatProvider,
    request: &CompletionRequest,
    cancel: &CancellationToken,
) -> Result<String> {
    if request.model.trim().is_empty() {
        bail!("Model is required.");
    }

    info!(
        provider = %provider.name(),
        model = %request.model,
        messages = request.messages.len(),
        "requesting completion"
    );

    tokio::select! {
        result = provider.complete(request) => {
            let text = result?;
            debug!(chars = text.len(), "completion received");
            Ok(text)
        }
        _ = cancel.cancelled() => bail!("request cancelled"),
    }
}

// ============ Request bodies ============

fn openai_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();
    json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}

fn system_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter(|m| m.role == ChatRole::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn anthropic_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .map(|m| {
            let role = if m.role == ChatRole::Assistant {
                "assistant"
            } else {
                "user"
            };
            json!({ "role": role, "content": [{ "type": "text", "text": m.content }] })
        })
        .collect();
    json!({
        "model": request.model,
        "system": system_text(&request.messages),
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}

fn gemini_body(request: &CompletionRequest) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .map(|m| {
            let role = if m.role == ChatRole::Assistant {
                "model"
            } else {
                "user"
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        },
    });
    let system = system_text(&request.messages);
    if !system.trim().is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

// ============ Response parsing ============

fn error_detail(data: &Value) -> Option<String> {
    if let Some(s) = data.get("error").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    if let Some(s) = data.get("message").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    data.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Join the `text` fields of an array of content parts.
fn join_text_parts<'a>(parts: impl Iterator<Item = &'a Value>) -> String {
    parts
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn openai_text(data: &Value) -> Result<String> {
    let content = data
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"));

    let text = match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => join_text_parts(parts.iter()),
        _ => String::new(),
    };
    if text.trim().is_empty() {
        bail!("OpenAI response did not include text content.");
    }
    Ok(text)
}

fn anthropic_text(data: &Value) -> Result<String> {
    let text = data
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            join_text_parts(
                parts
                    .iter()
                    .filter(|p| p.get("type").and_then(Value::as_str) == Some("text")),
            )
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        bail!("Claude response did not include text content.");
    }
    Ok(text)
}

fn gemini_text(data: &Value) -> Result<String> {
    let text = data
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| join_text_parts(parts.iter()))
        .unwrap_or_default();
    if text.trim().is_empty() {
        bail!("Gemini response did not include text content.");
    }
    Ok(text)
}

/// Model ids from a list of strings or `{id}` / `{name}` objects.
fn model_ids(list: Option<&Value>) -> Vec<String> {
    let Some(entries) = list.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj
                .get("id")
                .and_then(Value::as_str)
                .or_else(|| obj.get("name").and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .collect()
}

fn gemini_model_ids(list: Option<&Value>) -> Vec<String> {
    let Some(entries) = list.and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|entry| {
            entry
                .get("supportedGenerationMethods")
                .and_then(Value::as_array)
                .is_some_and(|methods| {
                    methods
                        .iter()
                        .any(|m| m.as_str() == Some("generateContent"))
                })
        })
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .map(|name| name.strip_prefix("models/").unwrap_or(name).to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn is_likely_chat_model(model_id: &str) -> bool {
    let id = model_id.trim().to_lowercase();
    let base = id.strip_prefix("ft:").unwrap_or(&id);

    if OPENAI_BLOCKED_FRAGMENTS.iter().any(|b| base.contains(b)) {
        return false;
    }

    // o-series reasoning models: "o1", "o3-mini", "o4-mini", ...
    let o_series = base.starts_with('o')
        && base
            .chars()
            .nth(1)
            .is_some_and(|c| ('1'..='9').contains(&c));

    o_series || OPENAI_CHAT_PREFIXES.iter().any(|p| base.starts_with(p))
}

/// Trim, drop empties, de-duplicate case-insensitively (first wins) and
/// sort case-insensitively.
fn unique_sorted(values: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.to_lowercase()))
        .collect();
    out.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "m".to_string(),
            messages: vec![
                ChatMessage::new(ChatRole::System, "be brief"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
                ChatMessage::user("bye"),
            ],
            temperature: 0.2,
            max_tokens: 1000,
        }
    }

    #[test]
    fn test_provider_name_parse() {
        assert_eq!("OpenAI".parse::<ProviderName>(), Ok(ProviderName::OpenAi));
        assert_eq!("claude".parse::<ProviderName>(), Ok(ProviderName::Anthropic));
        assert!("mistral".parse::<ProviderName>().is_err());
        let json = serde_json::to_string(&ProviderName::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn test_openai_body_keeps_system_message() {
        let body = openai_body(&request());
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_anthropic_body_lifts_system() {
        let body = anthropic_body(&request());
        assert_eq!(body["system"], "be brief");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[0]["content"][0]["text"], "hi");
    }

    #[test]
    fn test_gemini_body_roles_and_instruction() {
        let body = gemini_body(&request());
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1000);

        let mut no_system = request();
        no_system.messages.remove(0);
        assert!(gemini_body(&no_system).get("systemInstruction").is_none());
    }

    #[test]
    fn test_error_detail_precedence() {
        assert_eq!(error_detail(&json!({ "error": "quota" })).as_deref(), Some("quota"));
        assert_eq!(error_detail(&json!({ "message": "bad key" })).as_deref(), Some("bad key"));
        assert_eq!(
            error_detail(&json!({ "error": { "message": "nested" } })).as_deref(),
            Some("nested")
        );
        assert_eq!(error_detail(&Value::Null), None);
    }

    #[test]
    fn test_openai_text_shapes() {
        let plain = json!({ "choices": [{ "message": { "content": "answer" } }] });
        assert_eq!(openai_text(&plain).unwrap(), "answer");

        let parts = json!({ "choices": [{ "message": { "content": [{ "text": "a" }, { "text": "b" }] } }] });
        assert_eq!(openai_text(&parts).unwrap(), "a\nb");

        let empty = json!({ "choices": [{ "message": { "content": "  " } }] });
        assert!(openai_text(&empty).is_err());
    }

    #[test]
    fn test_anthropic_text_ignores_non_text_blocks() {
        let data = json!({ "content": [
            { "type": "tool_use", "text": "skip" },
            { "type": "text", "text": "kept" }
        ] });
        assert_eq!(anthropic_text(&data).unwrap(), "kept");
        assert!(anthropic_text(&json!({})).is_err());
    }

    #[test]
    fn test_gemini_text() {
        let data = json!({ "candidates": [{ "content": { "parts": [{ "text": "x" }] } }] });
        assert_eq!(gemini_text(&data).unwrap(), "x");
        assert!(gemini_text(&json!({ "candidates": [] })).is_err());
    }

    #[test]
    fn test_chat_model_filter() {
        for id in ["gpt-4.1-mini", "gpt-4o", "o3-mini", "chatgpt-4o-latest", "ft:gpt-4o-mini:acme", "gpt-oss-120b"] {
            assert!(is_likely_chat_model(id), "rejected {}", id);
        }
        for id in [
            "gpt-4o-realtime-preview",
            "text-embedding-3-small",
            "whisper-1",
            "dall-e-3",
            "omni-moderation-latest",
            "gpt-3.5-turbo-instruct",
            "babbage-002",
        ] {
            assert!(!is_likely_chat_model(id), "accepted {}", id);
        }
    }

    #[test]
    fn test_model_ids_and_gemini_filter() {
        let ids = model_ids(Some(&json!(["a", { "id": "b" }, { "name": "c" }, 5, { "id": "" }])));
        assert_eq!(ids, vec!["a", "b", "c"]);

        let gemini = gemini_model_ids(Some(&json!([
            { "name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent"] },
            { "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] },
            { "name": "models/gemini-1.5-pro" }
        ])));
        assert_eq!(gemini, vec!["gemini-2.0-flash"]);
    }

    #[test]
    fn test_unique_sorted() {
        let out = unique_sorted(vec![
            " gpt-4o ".to_string(),
            "GPT-4o".to_string(),
            "".to_string(),
            "Alpha".to_string(),
            "beta".to_string(),
        ]);
        assert_eq!(out, vec!["Alpha", "beta", "gpt-4o"]);
    }

    #[test]
    fn test_create_provider_requires_key() {
        let mut config = Config::default();
        config.providers.openai.api_key = None;
        assert!(create_provider(&config, ProviderName::OpenAi).is_err());

        config.providers.openai.api_key = Some("sk-test".to_string());
        let provider = create_provider(&config, ProviderName::OpenAi).unwrap();
        assert_eq!(provider.name(), ProviderName::OpenAi);
    }
}
