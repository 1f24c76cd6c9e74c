use super::{internal, required_id, to_json, MethodContext};
use quorum_core::errors::ApiError;
use quorum_core::validate::validate_create_template;
use serde_json::{json, Value};

pub fn create(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let new = validate_create_template(params)?;
    let template = ctx
        .service
        .context()
        .store
        .insert_template(&new)
        .map_err(internal)?;
    to_json(&template)
}

pub fn list(ctx: &MethodContext) -> Result<Value, ApiError> {
    let templates = ctx
        .service
        .context()
        .store
        .list_templates()
        .map_err(internal)?;
    Ok(json!({ "templates": to_json(&templates)? }))
}

pub fn delete(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "template_id")?;
    if ctx
        .service
        .context()
        .store
        .delete_template(id)
        .map_err(internal)?
    {
        Ok(json!({ "template_id": id, "deleted": true }))
    } else {
        Err(ApiError::not_found("Template"))
    }
}

/// Starts a run from the template; the run continues after the reply.
pub fn run(ctx: &MethodContext, params: &Value) -> Result<Value, ApiError> {
    let id = required_id(params, "template_id")?;
    let (submission, _handle) = ctx.service.run_template(id)?;
    to_json(&submission)
}
