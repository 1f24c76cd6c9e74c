use super::{EvaluateOptions, ModelClient, ProviderError};
use crate::model::ModelResponse;
use async_trait::async_trait;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleClient {
    pub model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleClient {
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

    async fn generate(&self, body: &serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        let req = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(body);
        super::send_json("google", req).await
    }
}

pub fn build_request_body(instruction: &str, opts: &EvaluateOptions) -> serde_json::Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": instruction }] }],
    });
    if let Some(system) = &opts.system_prompt {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }
    if let Some(t) = opts.temperature {
        body["generationConfig"] = json!({ "temperature": t });
    }
    body
}

/// A response without any candidate text is malformed; usage is optional.
pub fn parse_response(
    json: &serde_json::Value,
    execution_time_ms: u64,
) -> Result<ModelResponse, ProviderError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| ProviderError::Malformed {
            provider: "google",
            detail: match json.pointer("/promptFeedback/blockReason") {
                Some(reason) => format!("prompt blocked: {}", reason),
                None => "response has no candidates".to_string(),
            },
        })?;

    let response_text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    Ok(ModelResponse {
        response_text,
        input_tokens: super::token(json, "/usageMetadata/promptTokenCount"),
        output_tokens: super::token(json, "/usageMetadata/candidatesTokenCount"),
        total_tokens: super::token(json, "/usageMetadata/totalTokenCount"),
        execution_time_ms,
    })
}

#[async_trait]
impl ModelClient for GoogleClient {
    async fn evaluate(
        &self,
        instruction: &str,
        opts: &EvaluateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        let start = std::time::Instant::now();
        let json = self.generate(&build_request_body(instruction, opts)).await?;
        let resp = parse_response(&json, start.elapsed().as_millis() as u64)?;

        tracing::debug!(
            event = "provider_response",
            provider = "google",
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
        self.generate(&build_request_body("Hi", &EvaluateOptions::default()))
            .await
            .is_ok()
    }

    fn provider_name(&self) -> &'static str {
        "google"
    }
}
