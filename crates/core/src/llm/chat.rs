use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{CompletionInput, LlmClient, Provider};
use crate::settings::AiSettings;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const APP_TITLE: &str = "FolioAI";
const APP_REFERER: &str = "https://folioai.local";

/// OpenAI-compatible `/chat/completions` client (OpenRouter and OpenAI).
#[derive(Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionClient {
    pub fn from_settings(settings: &Settings, ai: &AiSettings) -> anyhow::Result<Self> {
        let base_url = settings
            .ai_base_url
            .clone()
            .unwrap_or_else(|| ai.provider.default_base_url().to_string());
        let timeout_secs = settings.ai_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            provider: ai.provider,
            api_key: ai.api_key.clone(),
            base_url,
            model: ai.model.clone(),
            max_tokens: settings.ai_max_tokens,
        })
    }

    fn diagnostics(
        &self,
        stage: &'static str,
        detail: String,
        raw_output: Option<String>,
        raw_response_json: Option<serde_json::Value>,
    ) -> LlmDiagnosticsError {
        LlmDiagnosticsError {
            provider: self.provider,
            model: self.model.clone(),
            stage,
            detail,
            raw_output,
            raw_response_json,
        }
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("API key is not a valid header value")?,
        );
        if self.provider == Provider::OpenRouter {
            headers.insert("HTTP-Referer", HeaderValue::from_static(APP_REFERER));
            headers.insert("X-Title", HeaderValue::from_static(APP_TITLE));
        }
        Ok(headers)
    }

    async fn create_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> anyhow::Result<(serde_json::Value, ChatCompletionResponse)> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.diagnostics("http", format!("request failed: {e}"), None, None))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read completion response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            let stage = if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                "auth"
            } else {
                "http"
            };
            return Err(self
                .diagnostics(stage, format!("status={status}"), Some(text), raw_response_json)
                .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text).map_err(|e| {
            self.diagnostics("decode", format!("invalid JSON: {e}"), Some(text.clone()), None)
        })?;
        let parsed = serde_json::from_value::<ChatCompletionResponse>(raw_json.clone())
            .map_err(|e| {
                self.diagnostics(
                    "decode",
                    format!("unexpected response shape: {e}"),
                    Some(text),
                    Some(raw_json.clone()),
                )
            })?;
        Ok((raw_json, parsed))
    }

    fn response_text(res: &ChatCompletionResponse) -> Option<String> {
        res.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatCompletionClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, input: CompletionInput) -> anyhow::Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(self
                .diagnostics("auth", "no API credential configured".to_string(), None, None)
                .into());
        }

        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: input.system,
                },
                Message {
                    role: "user",
                    content: input.user,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let (raw_json, res) = self.create_completion(req).await?;
        if let Some(reason) = res.choices.first().and_then(|c| c.finish_reason.as_deref()) {
            if reason == "length" {
                tracing::warn!(model = %self.model, "completion truncated at max_tokens");
            }
        }

        Self::response_text(&res).ok_or_else(|| {
            self.diagnostics(
                "empty",
                "response has no message content".to_string(),
                None,
                Some(raw_json),
            )
            .into()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(api_key: &str) -> ChatCompletionClient {
        let ai = AiSettings {
            provider: Provider::OpenRouter,
            model: "test/model".to_string(),
            api_key: api_key.to_string(),
        };
        ChatCompletionClient::from_settings(&Settings::default(), &ai).unwrap()
    }

    #[test]
    fn takes_first_choice_content() {
        let res: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "gen-1",
            "choices": [
                {"message": {"role": "assistant", "content": "  ```json\n{}\n```  "}, "finish_reason": "stop"},
                {"message": {"role": "assistant", "content": "second"}}
            ]
        }))
        .unwrap();
        assert_eq!(
            ChatCompletionClient::response_text(&res).as_deref(),
            Some("```json\n{}\n```")
        );
    }

    #[test]
    fn missing_or_blank_content_is_none() {
        let res: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert!(ChatCompletionClient::response_text(&res).is_none());

        let res: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(ChatCompletionClient::response_text(&res).is_none());
    }

    #[test]
    fn uses_provider_default_base_url() {
        let c = client("sk-test");
        assert_eq!(c.base_url, "https://openrouter.ai/api/v1");
        assert!(!format!("{c:?}").contains("sk-test"));
    }

    #[tokio::test]
    async fn missing_credential_is_an_auth_failure() {
        let err = client("")
            .complete(CompletionInput::json("hi".to_string()))
            .await
            .unwrap_err();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "auth");
        assert_eq!(diag.model, "test/model");
    }
}
