use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::error::{LlmError, Result};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat-completions client, non-streaming. Works
/// against OpenAI itself or any Ollama/vLLM/Groq/OpenRouter endpoint
/// that speaks the same wire format.
pub struct HttpLlmClient {
    http: Client,
}

impl HttpLlmClient {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

impl Default for HttpLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct OaiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<OaiUsage> for LlmUsage {
    fn from(u: OaiUsage) -> Self {
        Self { prompt_tokens: u.prompt_tokens, completion_tokens: u.completion_tokens }
    }
}

impl LlmClient for HttpLlmClient {
    fn call<'a>(&'a self, request: LlmRequest) -> BoxFuture<'a, Result<LlmResponse>> {
        Box::pin(async move {
            let base_url = request.model.base_url.as_deref().unwrap_or(DEFAULT_API_URL);

            let mut messages: Vec<OaiMessage> = Vec::with_capacity(request.messages.len() + 1);
            if let Some(system) = &request.system_prompt {
                messages.push(OaiMessage { role: "system", content: system });
            }
            for msg in &request.messages {
                messages.push(OaiMessage { role: &msg.role, content: &msg.content });
            }

            let body = ChatRequest {
                model: &request.model.model_id,
                messages,
                max_tokens: request.model.max_tokens,
                temperature: if request.model.temperature > 0.0 { Some(request.model.temperature) } else { None },
            };

            let mut req = self.http.post(base_url).json(&body);
            if let Some(key) = &request.model.api_key {
                req = req.header("Authorization", format!("Bearer {key}"));
            }

            let response = req.send().await.map_err(classify_reqwest_error)?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimit(format!("HTTP {status}")));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::BadResponse(format!("HTTP {status}: {body}")));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| LlmError::BadResponse(format!("invalid JSON body: {e}")))?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| LlmError::BadResponse("no choices in response".to_string()))?;

            Ok(LlmResponse { content, usage: parsed.usage.map(LlmUsage::from) })
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Network(e.to_string())
    }
}
