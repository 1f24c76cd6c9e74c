use crate::providers::ProviderError;

#[derive(Debug, Clone, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(pub String);

/// Coarse failure class used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    Transport,
    Timeout,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::Internal => "internal",
        }
    }
}

/// Machine-readable code carried by every API error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    InvalidProvider,
    InvalidApiKey,
    InvalidRubric,
    MissingRubricConfig,
    InvalidModelSelection,
    ModelInactive,
    NotFound,
    InternalError,
}

/// `{error, message, field?, details?}` as returned to API callers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub error: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(error: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn field(error: ErrorCode, field: &str, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.to_string()),
            ..Self::new(error, message)
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", what))
    }

    pub fn internal(err: &anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

/// Why a single model's unit of work failed. The display text is what lands
/// in the result row's `error_message`.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Model not found")]
    ModelNotFound,

    #[error("Model is inactive")]
    ModelInactive,

    #[error("Model timeout")]
    Timeout,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl UnitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UnitError::ModelNotFound | UnitError::ModelInactive => FailureKind::Configuration,
            UnitError::Timeout => FailureKind::Timeout,
            UnitError::Provider(ProviderError::UnknownProvider(_)) => FailureKind::Configuration,
            UnitError::Provider(_) => FailureKind::Transport,
            UnitError::Scoring(_) | UnitError::Internal(_) => FailureKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_error_messages() {
        assert_eq!(UnitError::ModelNotFound.to_string(), "Model not found");
        assert_eq!(UnitError::ModelInactive.to_string(), "Model is inactive");
        assert_eq!(UnitError::Timeout.to_string(), "Model timeout");

        let e = UnitError::from(ProviderError::Backend("rate limited".into()));
        assert_eq!(e.to_string(), "rate limited");
        assert_eq!(e.kind(), FailureKind::Transport);

        let e = UnitError::from(ProviderError::UnknownProvider("azure".into()));
        assert_eq!(e.kind(), FailureKind::Configuration);
    }

    #[test]
    fn test_api_error_body() {
        let e = ApiError::field(ErrorCode::InvalidApiKey, "api_key", "API key is required");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "error": "INVALID_API_KEY",
                "message": "API key is required",
                "field": "api_key"
            })
        );
        assert_eq!(e.to_string(), "API key is required");
    }
}
