//! Request validation for the submission and management boundaries.
//!
//! Inputs are raw JSON bodies; each validator either returns the typed
//! request or the first [`ApiError`] found.

use crate::errors::{ApiError, ErrorCode};
use crate::model::{
    ModelPatch, NewEvaluation, NewTemplate, Provider, RubricKind, MAX_INSTRUCTION_CHARS,
    MAX_NAME_CHARS, MAX_SYSTEM_PROMPT_CHARS,
};
use serde_json::{Map, Value};

type Object = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub evaluation: NewEvaluation,
    pub model_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewModel {
    pub provider: Provider,
    pub model_name: String,
    pub api_key: String,
    pub notes: Option<String>,
}

pub fn validate_create_evaluation(input: &Value) -> Result<EvaluationRequest, ApiError> {
    let obj = as_object(input)?;

    let instruction = required_text(obj, "instruction", "Instruction", MAX_INSTRUCTION_CHARS)?;
    let rubric = rubric(obj, "rubric_type")?;
    let model_ids = model_ids(obj)?;
    let (expected_output, partial_credit_concepts) = rubric_config(obj, rubric)?;
    let system_prompt = validate_system_prompt(obj.get("system_prompt"))?;
    let temperature = validate_temperature(obj.get("temperature"))?;

    Ok(EvaluationRequest {
        evaluation: NewEvaluation {
            instruction_text: instruction,
            accuracy_rubric: rubric,
            expected_output,
            partial_credit_concepts,
            template_id: None,
            system_prompt,
            temperature,
        },
        model_ids,
    })
}

pub fn validate_create_model(input: &Value) -> Result<NewModel, ApiError> {
    let obj = as_object(input)?;

    let provider = obj
        .get("provider")
        .and_then(Value::as_str)
        .and_then(Provider::parse)
        .ok_or_else(|| {
            ApiError::field(
                ErrorCode::InvalidProvider,
                "provider",
                "Provider must be one of: openai, anthropic, google",
            )
        })?;
    let model_name = required_text(obj, "model_name", "Model name", MAX_NAME_CHARS)?;

    let api_key = match obj.get("api_key") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            return Err(ApiError::field(
                ErrorCode::InvalidApiKey,
                "api_key",
                "API key is required",
            ))
        }
    };
    check_api_key_format(provider, &api_key)?;

    Ok(NewModel {
        provider,
        model_name,
        api_key,
        notes: opt_string(obj, "notes")?,
    })
}

pub fn check_api_key_format(provider: Provider, api_key: &str) -> Result<(), ApiError> {
    let ok = match provider {
        Provider::Openai => api_key.starts_with("sk-"),
        Provider::Anthropic => api_key.starts_with("sk-ant-"),
        Provider::Google => api_key.len() >= 20,
    };
    if ok {
        Ok(())
    } else {
        Err(ApiError::field(
            ErrorCode::InvalidApiKey,
            "api_key",
            format!("API key format is not valid for provider {}", provider),
        ))
    }
}

pub fn validate_update_model(input: &Value) -> Result<ModelPatch, ApiError> {
    let obj = as_object(input)?;
    let mut patch = ModelPatch::default();

    match obj.get("is_active") {
        None | Some(Value::Null) => {}
        Some(Value::Bool(b)) => patch.is_active = Some(*b),
        Some(_) => {
            return Err(ApiError::field(
                ErrorCode::InvalidInput,
                "is_active",
                "is_active must be a boolean",
            ))
        }
    }
    patch.notes = opt_string(obj, "notes")?;

    match obj.get("api_key") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(ApiError::field(
                ErrorCode::InvalidApiKey,
                "api_key",
                "API key cannot be empty",
            ))
        }
        Some(Value::String(s)) => patch.api_key = Some(s.trim().to_string()),
        Some(_) => {
            return Err(ApiError::field(
                ErrorCode::InvalidInput,
                "api_key",
                "api_key must be a string",
            ))
        }
    }
    Ok(patch)
}

pub fn validate_create_template(input: &Value) -> Result<NewTemplate, ApiError> {
    let obj = as_object(input)?;

    let name = required_text(obj, "name", "Name", MAX_NAME_CHARS)?;
    let description = opt_string(obj, "description")?;
    let instruction_text =
        required_text(obj, "instruction_text", "Instruction", MAX_INSTRUCTION_CHARS)?;
    let rubric = rubric(obj, "accuracy_rubric")?;
    let model_ids = model_ids(obj)?;
    let (expected_output, partial_credit_concepts) = rubric_config(obj, rubric)?;

    Ok(NewTemplate {
        name,
        description,
        instruction_text,
        model_ids,
        accuracy_rubric: rubric,
        expected_output,
        partial_credit_concepts,
        system_prompt: validate_system_prompt(obj.get("system_prompt"))?,
        temperature: validate_temperature(obj.get("temperature"))?,
    })
}

/// Absent or null is fine; a present prompt must have content.
pub fn validate_system_prompt(v: Option<&Value>) -> Result<Option<String>, ApiError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => check_system_prompt(s).map(|_| Some(s.clone())),
        Some(_) => Err(ApiError::field(
            ErrorCode::InvalidInput,
            "system_prompt",
            "System prompt must be a string",
        )),
    }
}

pub fn check_system_prompt(s: &str) -> Result<(), ApiError> {
    if s.trim().is_empty() {
        return Err(ApiError::field(
            ErrorCode::InvalidInput,
            "system_prompt",
            "System prompt cannot be empty",
        ));
    }
    if s.chars().count() > MAX_SYSTEM_PROMPT_CHARS {
        return Err(ApiError::field(
            ErrorCode::InvalidInput,
            "system_prompt",
            "System prompt must be 4,000 characters or fewer",
        ));
    }
    Ok(())
}

/// Absent or null means the default temperature.
pub fn validate_temperature(v: Option<&Value>) -> Result<Option<f64>, ApiError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let t = n.as_f64().unwrap_or(f64::NAN);
            check_temperature(t).map(|_| Some(t))
        }
        Some(_) => Err(ApiError::field(
            ErrorCode::InvalidInput,
            "temperature",
            "Temperature must be a valid number",
        )),
    }
}

pub fn check_temperature(t: f64) -> Result<(), ApiError> {
    if !t.is_finite() {
        return Err(ApiError::field(
            ErrorCode::InvalidInput,
            "temperature",
            "Temperature must be a valid number",
        ));
    }
    if !(0.0..=2.0).contains(&t) {
        return Err(ApiError::field(
            ErrorCode::InvalidInput,
            "temperature",
            "Temperature must be between 0.0 and 2.0",
        ));
    }
    Ok(())
}

fn as_object(input: &Value) -> Result<&Object, ApiError> {
    input.as_object().ok_or_else(|| {
        ApiError::new(ErrorCode::InvalidInput, "Request body must be a JSON object")
    })
}

fn required_text(obj: &Object, key: &str, label: &str, max: usize) -> Result<String, ApiError> {
    let s = match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => {
            return Err(ApiError::field(
                ErrorCode::InvalidInput,
                key,
                format!("{} is required", label),
            ))
        }
    };
    if s.chars().count() > max {
        return Err(ApiError::field(
            ErrorCode::InvalidInput,
            key,
            format!("{} must be {} characters or fewer", label, group_thousands(max)),
        ));
    }
    Ok(s.clone())
}

fn opt_string(obj: &Object, key: &str) -> Result<Option<String>, ApiError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ApiError::field(
            ErrorCode::InvalidInput,
            key,
            format!("{} must be a string", key),
        )),
    }
}

fn rubric(obj: &Object, key: &str) -> Result<RubricKind, ApiError> {
    obj.get(key)
        .and_then(Value::as_str)
        .and_then(RubricKind::parse)
        .ok_or_else(|| {
            ApiError::field(
                ErrorCode::InvalidRubric,
                key,
                "Rubric must be one of: exact_match, partial_credit, semantic_similarity",
            )
        })
}

fn model_ids(obj: &Object) -> Result<Vec<String>, ApiError> {
    let arr = match obj.get("model_ids") {
        Some(Value::Array(a)) if !a.is_empty() => a,
        _ => {
            return Err(ApiError::field(
                ErrorCode::InvalidModelSelection,
                "model_ids",
                "At least one model must be selected",
            ))
        }
    };
    arr.iter()
        .map(|v| match v.as_str() {
            Some(s) if uuid::Uuid::parse_str(s).is_ok() => Ok(s.to_string()),
            _ => Err(ApiError::field(
                ErrorCode::InvalidModelSelection,
                "model_ids",
                format!("Invalid model id: {}", v),
            )),
        })
        .collect()
}

/// Expected output and concept list, checked against what the rubric needs.
fn rubric_config(
    obj: &Object,
    rubric: RubricKind,
) -> Result<(Option<String>, Option<Vec<String>>), ApiError> {
    let expected = opt_string(obj, "expected_output")?;

    let concepts = match obj.get("partial_credit_concepts") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    Some(_) => {}
                    None => {
                        return Err(ApiError::field(
                            ErrorCode::InvalidInput,
                            "partial_credit_concepts",
                            "Concepts must be strings",
                        ))
                    }
                }
            }
            Some(out)
        }
        Some(_) => {
            return Err(ApiError::field(
                ErrorCode::InvalidInput,
                "partial_credit_concepts",
                "Concepts must be an array of strings",
            ))
        }
    };

    match rubric {
        RubricKind::PartialCredit => {
            if concepts.as_ref().map_or(true, |c| c.is_empty()) {
                return Err(ApiError::field(
                    ErrorCode::MissingRubricConfig,
                    "partial_credit_concepts",
                    "Partial credit rubric requires at least one concept",
                ));
            }
        }
        RubricKind::ExactMatch | RubricKind::SemanticSimilarity => {
            if expected.as_deref().map_or(true, |s| s.trim().is_empty()) {
                return Err(ApiError::field(
                    ErrorCode::InvalidInput,
                    "expected_output",
                    format!("Expected output is required for the {} rubric", rubric),
                ));
            }
        }
    }
    Ok((expected, concepts))
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
