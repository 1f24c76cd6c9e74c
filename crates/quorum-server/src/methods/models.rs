use super::{internal, required_id, to_json, MethodContext};
use quorum_core::errors::{ApiError, ErrorCode};
use quorum_core::model::{ModelConfiguration, Provider};
use quorum_core::storage::ModelDeletion;
use quorum_core::validate::{check_api_key_format, validate_create_model, validate_update_model};
use serde_json::{json, Value};

/// Stores the model, then probes the backend once. A failed probe is
/// reported, never fatal.
pub async fn create(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let new = validate_create_model(params)?;
    let exec = ctx.service.context();
    let model = exec
        .store
        .insert_model(new.provider, &new.model_name, &new.api_key, new.notes.as_deref())
        .map_err(internal)?;

    let reachable = probe(ctx, &model, &new.api_key).await;
    tracing::info!(
        event = "model_created",
        model_id = %model.id,
        provider = %model.provider,
        reachable,
    );

    let mut out = to_json(&model)?;
    out["validation_status"] = json!(if reachable { "valid" } else { "invalid" });
    Ok(out)
}

pub fn list(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let active_only = params
        .get("active_only")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let provider = match params.get("provider") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_str().and_then(Provider::parse).ok_or_else(|| {
            ApiError::field(
                ErrorCode::InvalidProvider,
                "provider",
                "Provider must be one of: openai, anthropic, google",
            )
        })?),
    };

    let store = &ctx.service.context().store;
    let models = store.list_models(active_only, provider).map_err(internal)?;
    let mut items = Vec::with_capacity(models.len());
    for m in &models {
        let mut v = to_json(m)?;
        v["usage_count"] = json!(store.model_usage_count(&m.id).map_err(internal)?);
        items.push(v);
    }
    Ok(json!({ "models": items }))
}

pub fn update(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "model_id")?;
    let patch = validate_update_model(params)?;
    let store = &ctx.service.context().store;

    let existing = store
        .get_model(id)
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Model"))?;
    if let Some(key) = &patch.api_key {
        check_api_key_format(existing.provider, key)?;
    }

    match store.update_model(id, &patch).map_err(internal)? {
        Some(m) => to_json(&m),
        None => Err(ApiError::not_found("Model")),
    }
}

pub fn delete(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "model_id")?;
    match ctx.service.context().store.delete_model(id).map_err(internal)? {
        ModelDeletion::Deleted => Ok(json!({ "model_id": id, "deleted": true })),
        ModelDeletion::NotFound => Err(ApiError::not_found("Model")),
        ModelDeletion::InUse(n) => Err(ApiError::new(
            ErrorCode::InvalidInput,
            "Model is used by an evaluation that has not finished",
        )
        .with_details(json!({ "model_id": id, "pending_results": n }))),
    }
}

/// Live connection check with the stored credential.
pub async fn test(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "model_id")?;
    let store = &ctx.service.context().store;
    let model = store
        .get_model(id)
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Model"))?;
    let api_key = store
        .decrypt_api_key(&model.api_key_encrypted)
        .map_err(internal)?;
    let success = probe(ctx, &model, &api_key).await;
    Ok(json!({ "model_id": id, "success": success }))
}

async fn probe(ctx: &MethodContext, model: &ModelConfiguration, api_key: &str) -> bool {
    let factory = &ctx.service.context().factory;
    match factory
        .test_connection(model.provider.as_str(), api_key, &model.model_name)
        .await
    {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(
                event = "connection_probe_failed",
                model_id = %model.id,
                error = %e,
            );
            false
        }
    }
}
