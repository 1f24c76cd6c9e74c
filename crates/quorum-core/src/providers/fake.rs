//! Scripted clients for tests and dry runs. No network.

use super::factory::ClientFactory;
use super::{EvaluateOptions, ModelClient, ProviderError};
use crate::model::{ModelResponse, Provider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FakeBehavior {
    Respond { text: String, delay: Duration },
    Fail { message: String, delay: Duration },
    /// Never answers; only a deadline ends the call.
    Hang,
}

impl FakeBehavior {
    pub fn respond(text: impl Into<String>) -> Self {
        FakeBehavior::Respond {
            text: text.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        FakeBehavior::Fail {
            message: message.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(self, delay: Duration) -> Self {
        match self {
            FakeBehavior::Respond { text, .. } => FakeBehavior::Respond { text, delay },
            FakeBehavior::Fail { message, .. } => FakeBehavior::Fail { message, delay },
            FakeBehavior::Hang => FakeBehavior::Hang,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub provider: String,
    pub model_name: String,
    pub api_key: String,
    pub instruction: String,
    pub opts: EvaluateOptions,
}

type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

pub struct FakeClient {
    provider: String,
    model_name: String,
    api_key: String,
    behavior: FakeBehavior,
    calls: CallLog,
}

#[async_trait]
impl ModelClient for FakeClient {
    async fn evaluate(
        &self,
        instruction: &str,
        opts: &EvaluateOptions,
    ) -> Result<ModelResponse, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                provider: self.provider.clone(),
                model_name: self.model_name.clone(),
                api_key: self.api_key.clone(),
                instruction: instruction.to_string(),
                opts: opts.clone(),
            });
        }

        match &self.behavior {
            FakeBehavior::Respond { text, delay } => {
                tokio::time::sleep(*delay).await;
                let input_tokens = instruction.split_whitespace().count() as u64;
                let output_tokens = text.split_whitespace().count() as u64;
                Ok(ModelResponse {
                    response_text: text.clone(),
                    input_tokens,
                    output_tokens,
                    total_tokens: input_tokens + output_tokens,
                    execution_time_ms: delay.as_millis() as u64,
                })
            }
            FakeBehavior::Fail { message, delay } => {
                tokio::time::sleep(*delay).await;
                Err(ProviderError::Backend(message.clone()))
            }
            FakeBehavior::Hang => std::future::pending().await,
        }
    }

    async fn test_connection(&self) -> bool {
        !matches!(self.behavior, FakeBehavior::Fail { .. })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Hands out [`FakeClient`]s scripted per model name. Unscripted models
/// answer with the default behavior.
#[derive(Clone)]
pub struct FakeFactory {
    scripts: Arc<Mutex<HashMap<String, FakeBehavior>>>,
    default: FakeBehavior,
    calls: CallLog,
}

impl Default for FakeFactory {
    fn default() -> Self {
        Self::new(FakeBehavior::respond("ok"))
    }
}

impl FakeFactory {
    pub fn new(default: FakeBehavior) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            default,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn script(self, model_name: impl Into<String>, behavior: FakeBehavior) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(model_name.into(), behavior);
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    fn create(
        &self,
        provider_tag: &str,
        api_key: &str,
        model_name: &str,
    ) -> Result<Arc<dyn ModelClient>, ProviderError> {
        if Provider::parse(provider_tag).is_none() {
            return Err(ProviderError::UnknownProvider(provider_tag.to_string()));
        }
        let behavior = self
            .scripts
            .lock()
            .ok()
            .and_then(|s| s.get(model_name).cloned())
            .unwrap_or_else(|| self.default.clone());

        Ok(Arc::new(FakeClient {
            provider: provider_tag.to_string(),
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            behavior,
            calls: self.calls.clone(),
        }))
    }
}
