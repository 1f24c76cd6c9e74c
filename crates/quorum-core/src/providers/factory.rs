use super::anthropic::AnthropicClient;
use super::google::GoogleClient;
use super::openai::OpenAIClient;
use super::{ModelClient, ProviderError};
use crate::model::Provider;
use async_trait::async_trait;
use std::sync::Arc;

/// Builds a client for one stored model configuration.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        provider_tag: &str,
        api_key: &str,
        model_name: &str,
    ) -> Result<Arc<dyn ModelClient>, ProviderError>;

    async fn test_connection(
        &self,
        provider_tag: &str,
        api_key: &str,
        model_name: &str,
    ) -> Result<bool, ProviderError> {
        let client = self.create(provider_tag, api_key, model_name)?;
        Ok(client.test_connection().await)
    }
}

/// The real backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderFactory;

#[async_trait]
impl ClientFactory for ProviderFactory {
    fn create(
        &self,
        provider_tag: &str,
        api_key: &str,
        model_name: &str,
    ) -> Result<Arc<dyn ModelClient>, ProviderError> {
        let provider = Provider::parse(provider_tag)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_tag.to_string()))?;
        let (key, model) = (api_key.to_string(), model_name.to_string());
        Ok(match provider {
            Provider::Openai => Arc::new(OpenAIClient::new(key, model)),
            Provider::Anthropic => Arc::new(AnthropicClient::new(key, model)),
            Provider::Google => Arc::new(GoogleClient::new(key, model)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_maps_tags_to_clients() {
        let f = ProviderFactory;
        for (tag, name) in [
            ("openai", "openai"),
            ("anthropic", "anthropic"),
            ("google", "google"),
        ] {
            let client = f.create(tag, "key", "m").unwrap();
            assert_eq!(client.provider_name(), name);
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = ProviderFactory.create("azure", "key", "m").err().unwrap();
        assert_eq!(err.to_string(), "Unknown provider: azure");
    }

    #[tokio::test]
    async fn test_connection_with_unknown_tag_errors() {
        assert!(ProviderFactory
            .test_connection("mistral", "key", "m")
            .await
            .is_err());
    }
}
