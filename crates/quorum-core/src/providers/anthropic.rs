use super::{EvaluateOptions, ModelClient, ProviderError, MAX_OUTPUT_TOKENS};
use crate::model::ModelResponse;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    pub model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            model,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: super::http_client(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post_messages(&self, body: &serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        let req = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body);
        super::send_json("anthropic", req).await
    }
}

pub fn build_request_body(
    model: &str,
    instruction: &str,
    opts: &EvaluateOptions,
    max_tokens: u32,
) -> serde_json::Value {
    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [{ "role": "user", "content": instruction }],
    });
    if let Some(system) = &opts.system_prompt {
        body["system"] = json!(system);
    }
    if let Some(t) = opts.temperature {
        body["temperature"] = json!(t);
    }
    body
}

/// First text block wins; total is derived since the API only reports the parts.
pub fn parse_response(json: &serde_json::Value, execution_time_ms: u64) -> ModelResponse {
    let response_text = json
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string();

    let input_tokens = super::token(json, "/usage/input_tokens");
    let output_tokens = super::token(json, "/usage/output_tokens");

    ModelResponse {
        response_text,
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
        execution_time_ms,
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn evaluate(
        &self,
        instruction: &str,
        opts: &EvaluateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        let start = std::time::Instant::now();
        let body = build_request_body(&self.model, instruction, opts, MAX_OUTPUT_TOKENS);
        let json = self.post_messages(&body).await?;
        let resp = parse_response(&json, start.elapsed().as_millis() as u64);

        tracing::debug!(
            event = "provider_response",
            provider = "anthropic",
            model = %self.model,
            system_prompt = opts.system_prompt.is_some(),
            temperature = ?opts.temperature,
            response = %super::preview(&resp.response_text),
            input_tokens = resp.input_tokens,
            output_tokens = resp.output_tokens,
            duration_ms = resp.execution_time_ms,
        );

        Ok(resp)
    }

    async fn test_connection(&self) -> bool {
        let body = build_request_body(&self.model, "Hi", &EvaluateOptions::default(), 10);
        self.post_messages(&body).await.is_ok()
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
