use quorum_core::engine::EvaluationService;
use quorum_core::errors::{ApiError, ErrorCode};
use serde_json::Value;

pub mod evaluations;
pub mod models;
pub mod templates;

/// Shared state every method handler sees.
#[derive(Clone)]
pub struct MethodContext {
    pub service: EvaluationService,
}

/// Method names served besides `initialize`.
pub const METHODS: &[&str] = &[
    "evaluations.submit",
    "evaluations.cancel",
    "evaluations.status",
    "evaluations.get",
    "evaluations.list",
    "evaluations.delete",
    "models.create",
    "models.list",
    "models.update",
    "models.delete",
    "models.test",
    "templates.create",
    "templates.list",
    "templates.delete",
    "templates.run",
];

/// `None` when the method does not exist.
pub async fn dispatch(
    ctx: &MethodContext,
    method: &str,
    params: &Value,
) -> Option<Result<Value, ApiError>> {
    let out = match method {
        "evaluations.submit" => evaluations::submit(ctx, params),
        "evaluations.cancel" => evaluations::cancel(ctx, params),
        "evaluations.status" => evaluations::status(ctx, params),
        "evaluations.get" => evaluations::get(ctx, params),
        "evaluations.list" => evaluations::list(ctx, params),
        "evaluations.delete" => evaluations::delete(ctx, params),
        "models.create" => models::create(ctx, params).await,
        "models.list" => models::list(ctx, params),
        "models.update" => models::update(ctx, params),
        "models.delete" => models::delete(ctx, params),
        "models.test" => models::test(ctx, params).await,
        "templates.create" => templates::create(ctx, params),
        "templates.list" => templates::list(ctx),
        "templates.delete" => templates::delete(ctx, params),
        "templates.run" => templates::run(ctx, params),
        _ => return None,
    };
    Some(out)
}

pub(crate) fn required_id<'a>(params: &'a Value, key: &str) -> Result<&'a str, ApiError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::field(ErrorCode::InvalidInput, key, format!("{} is required", key)))
}

pub(crate) fn to_json<T: serde::Serialize>(v: &T) -> Result<Value, ApiError> {
    serde_json::to_value(v).map_err(|e| ApiError::internal(&e.into()))
}

pub(crate) fn internal(e: anyhow::Error) -> ApiError {
    tracing::error!(event = "internal_error", error = %e);
    ApiError::internal(&e)
}
