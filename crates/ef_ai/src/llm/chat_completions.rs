use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ef_core::config::{ApiKey, ExamForgeConfig};
use ef_core::domain::PageImage;
use ef_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::{Llm, MultimodalRequest};

/// OpenAI-compatible `/chat/completions` client (Groq by default).
pub struct ChatCompletionsLlm {
    agent: ureq::Agent,
    endpoint: String,
    api_key: ApiKey,
    temperature: f32,
    max_tokens: u32,
}

impl ChatCompletionsLlm {
    pub fn from_config(cfg: &ExamForgeConfig) -> Result<Self, AppError> {
        let api_key = cfg.require_api_key()?.clone();
        let agent = ureq::AgentBuilder::new()
            .timeout(cfg.request_timeout())
            .build();
        Ok(Self {
            agent,
            endpoint: chat_endpoint(&cfg.llm_base_url),
            api_key,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }

    fn complete(&self, body: &ChatRequest<'_>) -> Result<String, AppError> {
        let payload = serde_json::to_value(body).map_err(|e| {
            AppError::new(codes::GENERATION_FAILED, "Failed to encode completion request")
                .with_details(e.to_string())
        })?;

        let resp = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key.expose()))
            .send_json(payload);

        match resp {
            Ok(r) => {
                let v: ChatResponse = r.into_json().map_err(|e| {
                    AppError::new(codes::GENERATION_FAILED, "Failed to decode completion response")
                        .with_details(e.to_string())
                })?;
                let content = v
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();
                if content.trim().is_empty() {
                    return Err(AppError::new(
                        codes::GENERATION_FAILED,
                        "Completion response was empty",
                    ));
                }
                Ok(content)
            }
            Err(ureq::Error::Status(status, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(
                    AppError::new(codes::GENERATION_FAILED, "Completion request was rejected")
                        .with_details(format!("status={status}; body={}", truncate(&body, 400)))
                        .with_retryable(status == 429 || status >= 500),
                )
            }
            Err(e) => Err(
                AppError::new(codes::GENERATION_FAILED, "Failed to call completion endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}

impl Llm for ChatCompletionsLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        self.complete(&ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Text(prompt.to_string()),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: None,
        })
    }

    fn generate_multimodal(&self, req: &MultimodalRequest<'_>) -> Result<String, AppError> {
        let mut parts = vec![ContentPart::Text {
            text: req.prompt.to_string(),
        }];
        parts.extend(req.images.iter().map(|img| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: data_url(img),
            },
        }));
        self.complete(&ChatRequest {
            model: req.model,
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(parts),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: req.json_output.then(|| ResponseFormat {
                kind: "json_object",
            }),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
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

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn data_url(image: &PageImage) -> String {
    format!("data:{};base64,{}", image.mime_type, BASE64.encode(&image.bytes))
}

/// Accepts a bare host, a `/v1` base, or a full `/chat/completions` URL.
fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
