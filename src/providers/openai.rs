use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;

use crate::config::GatewayConfig;
use crate::llm_manager::{Completion, GatewayError, GenerationParams, LLMProvider, Prompt, TokenUsage};

/// OpenAI chat completions provider (also works with compatible services)
pub struct OpenAIProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

impl OpenAIProvider {
    /// Create a provider using the key named in the gateway config
    pub fn from_config(gateway: &GatewayConfig) -> Result<Self> {
        let api_key = env::var(&gateway.api_key_env)
            .with_context(|| format!("{} environment variable not set", gateway.api_key_env))?;
        Ok(Self::with_config(api_key, gateway.base_url.clone()))
    }

    pub fn with_config(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request<'a>(prompt: &'a Prompt, params: &'a GenerationParams) -> ChatRequest<'a> {
        ChatRequest {
            model: &params.model,
            temperature: params.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        }
    }

    /// Map a non-success HTTP status onto the gateway error kinds
    fn classify_status(status: StatusCode, body: String) -> GatewayError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Auth(body),
            StatusCode::TOO_MANY_REQUESTS => GatewayError::Quota(body),
            other => GatewayError::Service {
                status: other.as_u16(),
                message: body,
            },
        }
    }

    fn parse_body(body: &str) -> Result<Completion, GatewayError> {
        let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
            error!("Failed to parse OpenAI response: {}", e);
            GatewayError::MalformedResponse(e.to_string())
        })?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GatewayError::MalformedResponse("response has no message content".to_string()))?;

        Ok(Completion {
            text,
            usage: response.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError> {
        let request = Self::build_request(prompt, params);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, body));
        }

        debug!("Raw OpenAI response: {}", body);
        Self::parse_body(&body)
    }
}
