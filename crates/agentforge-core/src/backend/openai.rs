//! OpenAI-compatible chat-completions backend
//!
//! Sends one `POST {base_url}/v1/chat/completions` per generation with JSON
//! output mode enabled. The output schema travels in the system message and
//! the rendered prompt becomes the user message, with media parts sent as
//! `image_url` content.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackendError, GenerationRequest, GenerativeBackend};
use crate::config::BackendConfig;
use crate::flows::template::PromptPart;

pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| BackendError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(&self, request: &GenerationRequest) -> ChatCompletionRequest {
        let system = format!(
            "Respond with a single JSON object that conforms to this JSON schema:\n{}",
            request.output_schema
        );

        let content = request
            .prompt
            .parts
            .iter()
            .map(|part| match part {
                PromptPart::Text { text } => ContentPart::Text { text: text.clone() },
                PromptPart::Media { url } => ContentPart::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                },
            })
            .collect();

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(system),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(content),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, BackendError> {
        let body = self.build_body(request);

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(
            operation = %request.operation,
            model = %self.model,
            parts = request.prompt.parts.len(),
            "Sending chat completion request"
        );

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::MalformedOutput("response has no message content".into()))?;

        parse_json_content(&content)
    }
}

/// Pull a readable message out of an error body, falling back to the raw text
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.kind {
            Some(kind) => format!("{}: {}", kind, parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    }
}

/// Parse model output as JSON, tolerating a surrounding Markdown code fence
fn parse_json_content(content: &str) -> Result<Value, BackendError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced)
        .map_err(|e| BackendError::MalformedOutput(format!("content is not JSON: {}", e)))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetails {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}
