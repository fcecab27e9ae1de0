//! LLM gateway: one model call in, one decision out.
//!
//! Every call runs under its own timeout. A network, timeout, rate-limit
//! or server failure is retried once with the same prompt; a second
//! failure is [`LlmError::Unavailable`].

use repolens_config::LlmConfig;
use repolens_core::message::Message;
use repolens_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use repolens_core::{ProviderError, ToolInvocation};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Longest we honor a provider's `Retry-After` before the one retry.
const MAX_PROVIDER_BACKOFF: Duration = Duration::from_secs(5);

/// What the model chose to do this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    FinalAnswer(String),
    /// One or more tool calls, in the order received. `thought` is any
    /// text that came with them.
    ToolCalls {
        thought: String,
        calls: Vec<ToolInvocation>,
    },
    /// The reply could not be used: empty, or the provider could not
    /// parse it.
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("completion service unavailable after {attempts} attempt(s): {last}")]
    Unavailable { attempts: u32, last: String },
}

pub struct LlmGateway {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn Provider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the model for its next move given the assembled prompt and the
    /// tool catalog.
    pub async fn decide(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Result<Decision, LlmError> {
        let request = self.request(messages, tools);
        let response = match self.call(request).await {
            Ok(response) => response,
            Err(Failure::Malformed(reason)) => return Ok(Decision::Malformed(reason)),
            Err(Failure::Unavailable(err)) => return Err(err),
        };
        Ok(Self::interpret(response))
    }

    /// A tool-less completion, used to synthesize an answer from what the
    /// loop gathered.
    pub async fn complete_text(&self, messages: Vec<Message>) -> Result<String, LlmError> {
        let request = self.request(messages, Vec::new());
        match self.call(request).await {
            Ok(response) if !response.message.content.trim().is_empty() => {
                Ok(response.message.content)
            }
            Ok(_) => Err(LlmError::Unavailable {
                attempts: 1,
                last: "empty completion".into(),
            }),
            Err(Failure::Malformed(reason)) => Err(LlmError::Unavailable {
                attempts: 1,
                last: reason,
            }),
            Err(Failure::Unavailable(err)) => Err(err),
        }
    }

    fn request(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        }
    }

    fn interpret(response: ProviderResponse) -> Decision {
        let message = response.message;
        if !message.tool_calls.is_empty() {
            let calls = message
                .tool_calls
                .iter()
                .map(|call| {
                    let mut invocation = ToolInvocation::from_message_call(call);
                    if invocation.id.is_empty() {
                        invocation.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                    }
                    invocation
                })
                .collect();
            return Decision::ToolCalls {
                thought: message.content,
                calls,
            };
        }
        if message.content.trim().is_empty() {
            return Decision::Malformed("the reply had neither text nor tool calls".into());
        }
        Decision::FinalAnswer(message.content)
    }

    async fn call(&self, request: ProviderRequest) -> Result<ProviderResponse, Failure> {
        let mut last = String::new();
        for attempt in 1..=2u32 {
            let outcome = tokio::time::timeout(self.timeout, self.provider.complete(request.clone()))
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::Timeout(format!(
                        "no reply within {}s",
                        self.timeout.as_secs()
                    )))
                });

            let err = match outcome {
                Ok(response) => {
                    debug!(
                        provider = self.provider.name(),
                        model = %response.model,
                        attempt,
                        tool_calls = response.message.tool_calls.len(),
                        "Completion received"
                    );
                    return Ok(response);
                }
                Err(ProviderError::MalformedResponse(reason)) => {
                    return Err(Failure::Malformed(reason));
                }
                Err(err) => err,
            };

            warn!(provider = self.provider.name(), attempt, error = %err, "Completion failed");
            last = err.to_string();
            if !is_retryable(&err) {
                return Err(Failure::Unavailable(LlmError::Unavailable {
                    attempts: attempt,
                    last,
                }));
            }
            if attempt == 1 {
                if let ProviderError::RateLimited { retry_after_secs } = err {
                    tokio::time::sleep(Duration::from_secs(retry_after_secs).min(MAX_PROVIDER_BACKOFF))
                        .await;
                }
            }
        }
        Err(Failure::Unavailable(LlmError::Unavailable { attempts: 2, last }))
    }
}

enum Failure {
    Malformed(String),
    Unavailable(LlmError),
}

fn is_retryable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Timeout(_) | ProviderError::Network(_) | ProviderError::RateLimited { .. } => {
            true
        }
        ProviderError::ApiError { status_code, .. } => *status_code >= 500,
        ProviderError::AuthenticationFailed(_)
        | ProviderError::NotConfigured(_)
        | ProviderError::MalformedResponse(_) => false,
    }
}
