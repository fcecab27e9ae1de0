//! Scripted providers for loop and handler tests.

use async_trait::async_trait;
use repolens_core::error::ProviderError;
use repolens_core::message::{Message, MessageToolCall};
use repolens_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

type Scripted = Result<ProviderResponse, ProviderError>;

/// Returns a sequence of canned results, one per `complete` call, and
/// records every request it saw.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<(Scripted, Duration)>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(results: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().map(|r| (r, Duration::ZERO)).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Delay the n-th reply by the n-th duration.
    pub fn with_delays(self, delays: Vec<Duration>) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for (slot, delay) in script.iter_mut().zip(delays) {
                slot.1 = delay;
            }
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let (result, delay) = {
            let mut requests = self.requests.lock().unwrap();
            let call = requests.len();
            requests.push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("ScriptedProvider: no response left for call #{call}"))
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// Answers with whatever the closure computes from the request.
pub struct FnProvider<F> {
    respond: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&ProviderRequest) -> Scripted + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> Provider for FnProvider<F>
where
    F: Fn(&ProviderRequest) -> Scripted + Send + Sync,
{
    fn name(&self) -> &str {
        "fn"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        // yield so concurrent loops interleave
        tokio::task::yield_now().await;
        (self.respond)(&request)
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A plain text reply (a final answer).
pub fn text(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// A reply requesting tool calls, with optional thought text.
pub fn tool_calls(calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls(thought, calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// A single tool call reply.
pub fn tool_call(name: &str, args: serde_json::Value) -> ProviderResponse {
    tool_calls(vec![call(name, args)], "")
}

pub fn call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
