use crate::model::ModelResponse;
use async_trait::async_trait;

pub mod anthropic;
pub mod factory;
pub mod fake;
pub mod google;
pub mod openai;

/// Output budget requested from every backend.
pub const MAX_OUTPUT_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluateOptions {
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned a malformed response: {detail}")]
    Malformed {
        provider: &'static str,
        detail: String,
    },

    /// Failure reported by a backend without an HTTP status to attach.
    #[error("{0}")]
    Backend(String),
}

/// One configured backend. Implementations never retry and never fall back.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn evaluate(
        &self,
        instruction: &str,
        opts: &EvaluateOptions,
    ) -> Result<ModelResponse, ProviderError>;

    /// Cheapest live call the backend offers; any failure is `false`.
    async fn test_connection(&self) -> bool;

    fn provider_name(&self) -> &'static str;
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

pub(crate) async fn send_json(
    provider: &'static str,
    req: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ProviderError> {
    let resp = req
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    resp.json().await.map_err(|e| ProviderError::Malformed {
        provider,
        detail: e.to_string(),
    })
}

pub(crate) fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub(crate) fn token(json: &serde_json::Value, pointer: &str) -> u64 {
    json.pointer(pointer).and_then(|v| v.as_u64()).unwrap_or(0)
}
