use super::openai_client::ChatCompletionRequest;
use crate::core::function_call::RawFunctionCall;
use crate::error::Result;
use crate::types::cost::TokenUsage;
use async_trait::async_trait;

/// One assistant message returned by the model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub function_call: Option<RawFunctionCall>,
    pub usage: Option<TokenUsage>,
    /// Model that served the request, as reported by the provider
    pub model: Option<String>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function_call: Some(RawFunctionCall::new(name, arguments)),
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The message text, empty when the model sent none
    pub fn content_text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// The external completion boundary.
///
/// Implementations own transport-level retries; an error returned here is
/// final for the dialogue.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, request: ChatCompletionRequest) -> Result<Completion> {
            let last = request
                .messages()
                .last()
                .and_then(|message| message["content"].as_str())
                .unwrap_or_default()
                .to_string();
            Ok(Completion::text(last).with_model(request.model()))
        }
    }

    #[test]
    fn test_model_behind_trait_object() {
        let model: Arc<dyn ChatModel> = Arc::new(EchoModel);
        let request = ChatCompletionRequest::new(
            "gpt-4o-mini",
            vec![json!({"role": "user", "content": "hello"})],
        );

        let completion = tokio_test::block_on(model.complete(request)).unwrap();
        assert_eq!(completion.content_text(), "hello");
        assert_eq!(completion.model.as_deref(), Some("gpt-4o-mini"));
        assert!(completion.function_call.is_none());
    }

    #[test]
    fn test_content_text_defaults_to_empty() {
        assert_eq!(Completion::default().content_text(), "");
        let call = Completion::call("query_hotels", "{}");
        assert_eq!(call.content_text(), "");
        assert_eq!(call.function_call.unwrap().name, "query_hotels");
    }
}
