//! Chat-completions client for the validation and drafting calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OpenAiConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("language model responded {code}: {body}")]
    Status { code: u16, body: String },
    #[error("language model returned no choices")]
    EmptyChoices,
}

#[async_trait]
pub trait LanguageModel {
    /// Send a role prompt plus serialized context, returning the reply text
    /// with surrounding whitespace trimmed.
    async fn invoke(&self, role_prompt: &str, context: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn invoke(&self, role_prompt: &str, context: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: role_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: context,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyChoices)?;

        Ok(reply.message.content.unwrap_or_default().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config(url: String) -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".to_string(),
            url,
            model: "gpt-4o-mini-2024-07-18".to_string(),
            temperature: 0.1,
            max_tokens: 1200,
        }
    }

    #[tokio::test]
    async fn test_invoke_sends_system_and_user_messages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini-2024-07-18",
                "max_tokens": 1200,
                "messages": [
                    {"role": "system", "content": "prompt"},
                    {"role": "user", "content": "{\"detalles\":\"x\"}"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  __COMPLETO__ \n"}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(
            config(format!("{}/v1/chat/completions", server.url())),
            reqwest::Client::new(),
        );
        let reply = client.invoke("prompt", r#"{"detalles":"x"}"#).await.unwrap();

        assert_eq!(reply, "__COMPLETO__");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = OpenAiClient::new(config(format!("{}/chat", server.url())), reqwest::Client::new());
        match client.invoke("p", "c").await {
            Err(LlmError::Status { code, body }) => {
                assert_eq!(code, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_choices() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/chat")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new(config(format!("{}/chat", server.url())), reqwest::Client::new());
        assert!(matches!(
            client.invoke("p", "c").await,
            Err(LlmError::EmptyChoices)
        ));
    }
}
