use super::{EvaluateOptions, ModelClient, ProviderError, MAX_OUTPUT_TOKENS};
use crate::model::ModelResponse;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIClient {
    pub model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
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
}

/// Reasoning-tier models (o1, o3, gpt-5 family) take `max_completion_tokens`
/// and reject a temperature override.
pub fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1") || model.starts_with("o3") || model.starts_with("gpt-5")
}

pub fn build_request_body(model: &str, instruction: &str, opts: &EvaluateOptions) -> serde_json::Value {
    let mut messages = Vec::new();
    if let Some(system) = &opts.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": instruction }));

    let mut body = json!({
        "model": model,
        "messages": messages,
    });

    if is_reasoning_model(model) {
        body["max_completion_tokens"] = json!(MAX_OUTPUT_TOKENS);
    } else {
        body["max_tokens"] = json!(MAX_OUTPUT_TOKENS);
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }
    }
    body
}

pub fn parse_response(json: &serde_json::Value, execution_time_ms: u64) -> ModelResponse {
    let response_text = json
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    ModelResponse {
        response_text,
        input_tokens: super::token(json, "/usage/prompt_tokens"),
        output_tokens: super::token(json, "/usage/completion_tokens"),
        total_tokens: super::token(json, "/usage/total_tokens"),
        execution_time_ms,
    }
}

#[async_trait]
impl ModelClient for OpenAIClient {
    async fn evaluate(
        &self,
        instruction: &str,
        opts: &EvaluateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        let start = std::time::Instant::now();
        let body = build_request_body(&self.model, instruction, opts);

        let req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = super::send_json("openai", req).await?;

        let resp = parse_response(&json, start.elapsed().as_millis() as u64);

        let temperature = if is_reasoning_model(&self.model) {
            "not supported".to_string()
        } else {
            opts.temperature
                .map(|t| t.to_string())
                .unwrap_or_else(|| "default".into())
        };
        tracing::debug!(
            event = "provider_response",
            provider = "openai",
            model = %self.model,
            system_prompt = opts.system_prompt.is_some(),
            temperature = %temperature,
            response = %super::preview(&resp.response_text),
            input_tokens = resp.input_tokens,
            output_tokens = resp.output_tokens,
            duration_ms = resp.execution_time_ms,
        );

        Ok(resp)
    }

    async fn test_connection(&self) -> bool {
        let req = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key);
        super::send_json("openai", req).await.is_ok()
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
