use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::chat_model::{ChatModel, Completion};
use super::response_utils::parse_completion;
use crate::error::{AgentError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Exponential backoff for transient provider failures
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before retrying after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

#[derive(Clone, Debug)]
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Build a client from `OPENAI_API_KEY` and the optional
    /// `OPENAI_BASE_URL` / `OPENROUTER_BASE_URL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            AgentError::Config(
                "OPENAI_API_KEY environment variable must be set before creating a client"
                    .to_string(),
            )
        })?;
        let mut client = Self::new(api_key);
        if let Ok(base_url) =
            std::env::var("OPENAI_BASE_URL").or_else(|_| std::env::var("OPENROUTER_BASE_URL"))
        {
            client.set_base_url(base_url);
        }
        Ok(client)
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.set_base_url(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a completion body, retrying transient failures per the policy
    pub async fn chat_completion(&self, body: &Value) -> Result<Value> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| AgentError::Config(format!("Failed to build HTTP client: {err}")))?;
        let request_url = build_chat_url(&self.base_url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.send_once(&client, &request_url, body).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if !error.is_transient() {
                return Err(error);
            }
            if attempt >= self.retry.max_attempts() {
                return Err(AgentError::RetriesExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let delay = match &error {
                AgentError::RateLimit { retry_after } => {
                    Duration::from_secs(*retry_after).min(self.retry.max_delay)
                }
                _ => self.retry.delay_for(attempt),
            };
            warn!(
                target: "tod_bench::provider",
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient provider failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        client: &reqwest::Client,
        request_url: &str,
        body: &Value,
    ) -> Result<Value> {
        let response = client
            .post(request_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AgentError::Timeout(format!("completion request timed out: {err}"))
                } else {
                    AgentError::Transport(format!("HTTP request failed: {err}"))
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let response_text = response
            .text()
            .await
            .map_err(|err| AgentError::Transport(format!("Failed to read response: {err}")))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            if let Some(retry_after) = retry_after {
                return Err(AgentError::RateLimit { retry_after });
            }
        }

        if !status.is_success() {
            return Err(AgentError::Http {
                status: status.as_u16(),
                message: api_error_message(&response_text),
            });
        }

        let response_json: Value = serde_json::from_str(&response_text)?;
        if let Some(error) = response_json.get("error").filter(|error| !error.is_null()) {
            let error_message = error
                .get("message")
                .and_then(|value| value.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| error.to_string());
            return Err(AgentError::Provider(error_message));
        }

        Ok(response_json)
    }
}

#[async_trait]
impl ChatModel for OpenAIClient {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<Completion> {
        let requested_model = request.model().to_string();
        debug!(
            target: "tod_bench::provider",
            model = %requested_model,
            messages = request.messages().len(),
            functions = request.functions().len(),
            "sending completion request"
        );
        let response = self.chat_completion(&request.into_value()).await?;
        let mut completion = parse_completion(&response)?;
        completion.model.get_or_insert(requested_model);
        Ok(completion)
    }
}

fn api_error_message(response_text: &str) -> String {
    serde_json::from_str::<Value>(response_text)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|error| error.get("message"))
                .and_then(|value| value.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| response_text.to_string())
}

fn build_chat_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/chat/completions") {
        trimmed.to_string()
    } else {
        format!("{}/chat/completions", trimmed)
    }
}

/// Whether the model may call a function in its reply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionCallMode {
    Auto,
    None,
}

impl FunctionCallMode {
    fn as_value(&self) -> Value {
        match self {
            FunctionCallMode::Auto => json!("auto"),
            FunctionCallMode::None => json!("none"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Value>,
    functions: Vec<Value>,
    function_call: Option<FunctionCallMode>,
    temperature: Option<f32>,
    stop: Vec<String>,
    max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model: model.into(),
            messages,
            functions: Vec::new(),
            function_call: None,
            temperature: None,
            stop: Vec::new(),
            max_tokens: None,
        }
    }

    pub fn with_functions(mut self, functions: Vec<Value>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_function_call(mut self, mode: FunctionCallMode) -> Self {
        self.function_call = Some(mode);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    pub fn functions(&self) -> &[Value] {
        &self.functions
    }

    pub fn function_call(&self) -> Option<FunctionCallMode> {
        self.function_call
    }

    pub fn stop(&self) -> &[String] {
        &self.stop
    }

    pub fn into_value(self) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.messages,
        });

        if !self.functions.is_empty() {
            body["functions"] = Value::Array(self.functions);
            if let Some(mode) = self.function_call {
                body["function_call"] = mode.as_value();
            }
        }

        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        if !self.stop.is_empty() {
            body["stop"] = json!(self.stop);
        }

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }
}
