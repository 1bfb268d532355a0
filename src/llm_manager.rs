use crate::config::Config;
use crate::event_bus::{Event, EventBus, EventEmitter};
use crate::impl_event_emitter;
use async_trait::async_trait;
use log::{debug, error};
use std::sync::Arc;
use thiserror::Error;

/// A system instruction plus a user instruction.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Per-call model selection.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Text returned by a provider for one call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Why a gateway call did not produce text.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("could not reach the model service: {0}")]
    Transport(String),
    #[error("the model service rejected the credentials: {0}")]
    Auth(String),
    #[error("the model service quota or rate limit was exceeded: {0}")]
    Quota(String),
    #[error("the model service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },
    #[error("the model service returned an unreadable response: {0}")]
    MalformedResponse(String),
}

/// Trait representing an LLM provider.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Name of the provider.
    fn name(&self) -> &str;

    /// Send one prompt and return the first completion.
    async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<Completion, GatewayError>;
}

/// Routes every model call through one provider and records usage.
pub struct LLMManager {
    provider: Box<dyn LLMProvider>,
    event_bus: Option<Arc<EventBus>>,
    config: Arc<Config>,
}

impl LLMManager {
    pub fn new(provider: Box<dyn LLMProvider>, config: Arc<Config>) -> Self {
        Self {
            provider,
            event_bus: None,
            config,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.set_event_bus(bus);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send a prompt to the provider, emitting call events around it.
    pub async fn generate(
        &self,
        prompt: &Prompt,
        params: &GenerationParams,
    ) -> Result<String, GatewayError> {
        let provider = self.provider.name().to_string();
        let _ = self
            .emit_event(Event::APICallStarted {
                provider: provider.clone(),
                model: params.model.clone(),
            })
            .await;
        debug!(
            "Calling {} with model {} at temperature {}",
            provider, params.model, params.temperature
        );

        match self.provider.generate(prompt, params).await {
            Ok(completion) => {
                // Rough estimate when the provider reports nothing: 1 token ≈ 4 characters
                let usage = completion.usage.unwrap_or(TokenUsage {
                    input_tokens: prompt.char_len() / 4,
                    output_tokens: completion.text.chars().count() / 4,
                });
                let cost = self.calculate_cost(&params.model, usage);
                let _ = self
                    .emit_event(Event::APICallCompleted {
                        provider,
                        tokens: usage.input_tokens + usage.output_tokens,
                        cost,
                    })
                    .await;
                Ok(completion.text)
            }
            Err(e) => {
                error!("{} call failed: {}", provider, e);
                let _ = self
                    .emit_event(Event::APIError {
                        provider,
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    fn calculate_cost(&self, model: &str, usage: TokenUsage) -> f32 {
        match self.config.pricing_for(model) {
            Some(pricing) => {
                let input_cost = pricing.cost_per_1m_input_tokens.unwrap_or(0.0)
                    * (usage.input_tokens as f32)
                    / 1_000_000.0;
                let output_cost = pricing.cost_per_1m_output_tokens.unwrap_or(0.0)
                    * (usage.output_tokens as f32)
                    / 1_000_000.0;
                input_cost + output_cost
            }
            None => 0.0,
        }
    }
}

impl_event_emitter!(LLMManager);
