//! Answerer backed by an OpenAI-compatible or Anthropic chat endpoint.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{format_context, AnswerError, Answerer, RetrievedChunk};

/// Which wire format the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    OpenAi,
    Anthropic,
}

/// Configuration for [`ApiAnswerer`].
#[derive(Debug, Clone)]
pub struct ApiAnswererConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    pub flavor: ApiFlavor,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Response length cap (Anthropic requires one)
    pub max_tokens: u32,
}

impl ApiAnswererConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            flavor: ApiFlavor::OpenAi,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            max_tokens: 1024,
        }
    }

    pub fn claude(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            flavor: ApiFlavor::Anthropic,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            max_tokens: 1024,
        }
    }
}

/// Sends question and context to a chat model and returns its reply with the
/// source notes listed underneath.
pub struct ApiAnswerer {
    client: Client,
    config: ApiAnswererConfig,
}

impl ApiAnswerer {
    pub fn new(config: ApiAnswererConfig) -> Result<Self, AnswerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnswerError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
        let context_text = format_context(context);
        format!(
            r#"Answer the question using only the notes below. Each note excerpt starts with its path in brackets.

NOTES:
{context_text}

QUESTION:
{question}

Guidelines:
- If the notes do not contain the answer, say so
- Mention the note paths you relied on
- Keep the answer short"#
        )
    }

    /// Call the API with retry logic.
    async fn call_api(&self, prompt: &str) -> Result<String, AnswerError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model = %self.config.model, "Calling answer API");

            let result = match self.config.flavor {
                ApiFlavor::OpenAi => self.openai_request(prompt).await,
                ApiFlavor::Anthropic => self.anthropic_request(prompt).await,
            };

            match result {
                Ok(answer) => return Ok(answer),
                // A malformed body will not improve on retry
                Err(e @ AnswerError::ParseError(_)) => return Err(e),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "API call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn check_status(response: Response) -> Result<Response, AnswerError> {
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AnswerError::RateLimitExceeded);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnswerError::ApiError(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }

    async fn openai_request(&self, prompt: &str) -> Result<String, AnswerError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<ChatMessage<'a>>,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<OpenAIChoice>,
        }

        #[derive(Deserialize)]
        struct OpenAIChoice {
            message: OpenAIMessageResponse,
        }

        #[derive(Deserialize)]
        struct OpenAIMessageResponse {
            content: Option<String>,
        }

        let request = OpenAIRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| AnswerError::ApiError(e.to_string()))?;

        let body: OpenAIResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AnswerError::ParseError(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnswerError::ParseError("No choices in response".to_string()))
    }

    async fn anthropic_request(&self, prompt: &str) -> Result<String, AnswerError> {
        #[derive(Serialize)]
        struct AnthropicRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<ChatMessage<'a>>,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Vec<AnthropicContent>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            #[serde(default)]
            text: String,
        }

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/messages", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| AnswerError::ApiError(e.to_string()))?;

        let body: AnthropicResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AnswerError::ParseError(e.to_string()))?;

        let text: String = body.content.into_iter().map(|c| c.text).collect();
        if text.is_empty() {
            return Err(AnswerError::ParseError("No content in response".to_string()));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Distinct source paths in retrieval order.
fn sources_line(context: &[RetrievedChunk]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for chunk in context {
        if !seen.contains(&chunk.note_path.as_str()) {
            seen.push(&chunk.note_path);
        }
    }
    format!("Sources: {}", seen.join(", "))
}

#[async_trait]
impl Answerer for ApiAnswerer {
    async fn answer(
        &self,
        question: &str,
        context: &[RetrievedChunk],
    ) -> Result<String, AnswerError> {
        let prompt = Self::build_prompt(question, context);
        let reply = self.call_api(&prompt).await?;
        Ok(format!("{}\n\n{}", reply.trim(), sources_line(context)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chunk(path: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            note_path: path.to_string(),
            text: text.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_openai_config() {
        let config = ApiAnswererConfig::openai("test-key", "gpt-4o-mini");
        assert!(config.base_url.contains("openai"));
        assert_eq!(config.flavor, ApiFlavor::OpenAi);
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_claude_config() {
        let config = ApiAnswererConfig::claude("test-key", "claude-3-haiku-20240307");
        assert!(config.base_url.contains("anthropic"));
        assert_eq!(config.flavor, ApiFlavor::Anthropic);
    }

    #[test]
    fn test_prompt_contains_question_and_notes() {
        let prompt =
            ApiAnswerer::build_prompt("When is the launch?", &[chunk("plan.md", "Launch in May")]);
        assert!(prompt.contains("When is the launch?"));
        assert!(prompt.contains("[plan.md] Launch in May"));
    }

    #[test]
    fn test_sources_line_dedupes_in_order() {
        let context = vec![chunk("b.md", "1"), chunk("a.md", "2"), chunk("b.md", "3")];
        assert_eq!(sources_line(&context), "Sources: b.md, a.md");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_errors() {
        let mut config = ApiAnswererConfig::openai("test-key", "gpt-4o-mini");
        config.base_url = "http://127.0.0.1:9".to_string();
        config.max_retries = 1;
        config.timeout = Duration::from_secs(2);
        let answerer = ApiAnswerer::new(config).unwrap();

        let result = answerer.answer("q", &[chunk("a.md", "x")]).await;
        assert!(matches!(result, Err(AnswerError::ApiError(_))));
    }

    fn mock_answerer(server: &MockServer, flavor: ApiFlavor) -> ApiAnswerer {
        let mut config = match flavor {
            ApiFlavor::OpenAi => ApiAnswererConfig::openai("test-key", "gpt-4o-mini"),
            ApiFlavor::Anthropic => ApiAnswererConfig::claude("test-key", "claude-test"),
        };
        config.base_url = server.uri();
        config.max_retries = 3;
        config.timeout = Duration::from_secs(5);
        ApiAnswerer::new(config).unwrap()
    }

    fn openai_reply(text: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
    }

    #[tokio::test]
    async fn test_rate_limited_then_ok_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("Forty-two.")))
            .expect(1)
            .mount(&server)
            .await;

        let answerer = mock_answerer(&server, ApiFlavor::OpenAi);
        let reply = answerer.answer("q", &[chunk("a.md", "x")]).await.unwrap();

        assert_eq!(reply, "Forty-two.\n\nSources: a.md");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let answerer = mock_answerer(&server, ApiFlavor::OpenAi);
        let result = answerer.answer("q", &[chunk("a.md", "x")]).await;

        assert!(matches!(result, Err(AnswerError::ParseError(_))));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reply_ends_with_distinct_sources() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [
                    { "type": "text", "text": "Rust is " },
                    { "type": "text", "text": "a language.  " }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answerer = mock_answerer(&server, ApiFlavor::Anthropic);
        let context = vec![chunk("a.md", "1"), chunk("b.md", "2"), chunk("a.md", "3")];
        let reply = answerer.answer("What is Rust?", &context).await.unwrap();

        assert_eq!(reply, "Rust is a language.\n\nSources: a.md, b.md");
    }
}
