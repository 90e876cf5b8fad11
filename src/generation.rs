//! Language-model completion providers.
//!
//! The completion model is an opaque service behind the
//! [`CompletionProvider`] seam: the composer hands it one prompt string
//! and gets back the model's text. [`GroqCompletionProvider`] talks to
//! Groq's OpenAI-compatible chat completions API;
//! [`MockCompletionProvider`] is the deterministic stand-in for tests and
//! offline runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::retry::RetryPolicy;
use crate::types::SolaceError;

/// Generates a completion for a fully rendered prompt.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Runs the model on `prompt` and returns its raw text output.
    ///
    /// Output is passed through without semantic validation; error
    /// handling and masking are the caller's concern.
    async fn complete(&self, prompt: &str) -> Result<String, SolaceError>;
}

// ── Groq (OpenAI-compatible chat completions) ──────────────────────────

/// Completion provider backed by the Groq chat completions API.
pub struct GroqCompletionProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl GroqCompletionProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            retry,
        }
    }

    async fn request_completion(&self, prompt: &str) -> Result<String, SolaceError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": self.temperature,
            }))
            .send()
            .await
            .map_err(|err| SolaceError::Generation(format!("completion request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(SolaceError::Generation(format!(
                "completion endpoint returned {}",
                response.status()
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|err| {
            SolaceError::Generation(format!("malformed completion response: {err}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| SolaceError::Generation("completion returned no choices".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for GroqCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String, SolaceError> {
        self.retry
            .run("complete", || self.request_completion(prompt))
            .await
    }
}

// ── Mock provider for tests ────────────────────────────────────────────

/// Scriptable completion provider.
///
/// Records every prompt it receives so tests can assert on what was
/// actually sent to the model; can be switched into a failing mode to
/// exercise degraded paths.
#[derive(Default)]
pub struct MockCompletionProvider {
    reply: String,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletionProvider {
    /// A provider that always answers with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails like a timed-out upstream.
    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String, SolaceError> {
        self.prompts.lock().push(prompt.to_string());
        if self.fail {
            return Err(SolaceError::Timeout {
                operation: "complete",
                millis: 0,
            });
        }
        Ok(self.reply.clone())
    }
}
