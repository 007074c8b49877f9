//! OpenAI互換のチャット補完APIクライアント。
//!
//! 歌詞生成とテーマ抽出の両方で使う。再試行は行わない。
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TextGenerator, TextRequest};
use crate::util::{error::UpstreamStatus, redact::redact, text::truncate_error_message};

/// OpenAIクライアントの設定。
#[derive(Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// チャット補完APIとの通信を管理するクライアント。
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &redact(&self.api_key))
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// 新しいクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.timeout)
            .build()
            .context("failed to build openai HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid openai base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    /// システムロールとユーザープロンプトで1回だけ補完を実行する。
    ///
    /// # Errors
    /// 通信失敗、エラーステータス、または本文が空の応答の場合はエラーを返します。
    pub async fn chat_completion(&self, request: &TextRequest) -> Result<String> {
        let url = self
            .base_url
            .join("v1/chat/completions")
            .context("failed to build chat completion URL")?;

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        debug!(
            model = %request.model,
            prompt_chars = request.prompt.chars().count(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated_body = truncate_error_message(&body);
            return Err(anyhow::Error::new(UpstreamStatus(status)).context(format!(
                "chat completion endpoint returned error status {status}: {truncated_body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to deserialize chat completion response")?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("chat completion response contained no message content"))
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate_text(&self, request: &TextRequest) -> Result<String> {
        self.chat_completion(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::error::{ErrorKind, classify_error};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig {
            base_url: server.uri(),
            api_key: "sk-test-key".to_string(),
            timeout: Duration::from_secs(5),
        })
        .expect("client should build")
    }

    fn request() -> TextRequest {
        TextRequest {
            system: "You are a professional song theme creator.".to_string(),
            prompt: "歌詞".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    #[tokio::test]
    async fn chat_completion_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You are a professional song theme creator."},
                    {"role": "user", "content": "歌詞"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "夕陽下的約定"}},
                    {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .chat_completion(&request())
            .await
            .expect("completion succeeds");

        assert_eq!(text, "夕陽下的約定");
    }

    #[tokio::test]
    async fn chat_completion_fails_on_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let error = client_for(&server)
            .chat_completion(&request())
            .await
            .expect_err("empty choices should fail");

        assert!(error.to_string().contains("no message content"));
    }

    #[tokio::test]
    async fn chat_completion_error_status_is_classified_and_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("x".repeat(10_000)))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .chat_completion(&request())
            .await
            .expect_err("401 should fail");

        let message = error.to_string();
        assert!(message.contains("401"));
        assert!(message.contains("truncated"));
        assert!(message.len() < 1_000);
        assert_eq!(classify_error(&error), ErrorKind::Fatal);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let client = OpenAiClient::new(OpenAiConfig {
            base_url: "http://localhost:8080/".to_string(),
            api_key: "sk-very-secret".to_string(),
            timeout: Duration::from_secs(1),
        })
        .expect("client should build");

        let rendered = format!("{client:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("sk-v***"));
    }
}
