use super::{internal, required_id, to_json, MethodContext};
use quorum_core::errors::{ApiError, ErrorCode};
use quorum_core::model::EvaluationFilter;
use serde_json::{json, Value};

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

pub fn submit(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let submission = ctx.service.submit(params)?;
    to_json(&submission)
}

pub fn cancel(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "evaluation_id")?;
    let cancelled = ctx.service.cancel(id).map_err(internal)?;
    Ok(json!({ "evaluation_id": id, "cancelled": cancelled }))
}

pub fn status(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "evaluation_id")?;
    match ctx.service.status(id).map_err(internal)? {
        Some(view) => to_json(&view),
        None => Err(ApiError::not_found("Evaluation")),
    }
}

pub fn get(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "evaluation_id")?;
    match ctx.service.get(id).map_err(internal)? {
        Some(detail) => to_json(&detail),
        None => Err(ApiError::not_found("Evaluation")),
    }
}

/// Paged history. Filter keys sit next to `limit`/`offset` in the params.
pub fn list(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let filter: EvaluationFilter = if params.is_null() {
        EvaluationFilter::default()
    } else {
        serde_json::from_value(params.clone())
            .map_err(|e| ApiError::new(ErrorCode::InvalidInput, format!("Invalid filter: {e}")))?
    };
    let limit = match params.get("limit").and_then(Value::as_u64) {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(n) => n.min(MAX_PAGE_SIZE as u64) as u32,
    };
    let offset = params
        .get("offset")
        .and_then(Value::as_u64)
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(0);

    let store = &ctx.service.context().store;
    let items = store
        .list_evaluations(&filter, limit, offset)
        .map_err(internal)?;
    let total = store.count_evaluations(&filter).map_err(internal)?;

    Ok(json!({
        "items": to_json(&items)?,
        "total": total,
        "page": offset / limit + 1,
        "page_size": limit,
    }))
}

pub fn delete(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let ids: Vec<String> = params
        .get("ids")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    if ids.is_empty() {
        return Err(ApiError::field(ErrorCode::InvalidInput, "ids", "Invalid IDs"));
    }
    let deleted = ctx
        .service
        .context()
        .store
        .delete_evaluations(&ids)
        .map_err(internal)?;
    Ok(json!({ "deleted": deleted }))
}
