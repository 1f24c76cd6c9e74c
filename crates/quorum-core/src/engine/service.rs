use super::executor::{EvaluationExecutor, ExecutorContext, ExecutorState};
use super::registry::ExecutorRegistry;
use crate::errors::{ApiError, ErrorCode};
use crate::model::{
    Evaluation, EvaluationJob, EvaluationStatus, ModelConfiguration, Provider, ResultStatus,
    ResultWithModel,
};
use crate::validate::{validate_create_evaluation, EvaluationRequest};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedModel {
    pub model_id: String,
    pub model_name: String,
    pub provider: Provider,
    pub status: ResultStatus,
}

/// Immediate answer to a submission; the run continues in the background.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub evaluation_id: String,
    pub status: EvaluationStatus,
    pub models: Vec<SubmittedModel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationDetail {
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub results: Vec<ResultWithModel>,
    pub running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub evaluation_id: String,
    pub status: EvaluationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: bool,
}

/// Spawns the run and registers its executor. The task removes its own
/// registry entry when it ends, unless a cancel already did.
pub fn start_evaluation(
    registry: Arc<ExecutorRegistry>,
    ctx: ExecutorContext,
    job: EvaluationJob,
) -> JoinHandle<ExecutorState> {
    let evaluation_id = job.evaluation_id.clone();
    let executor = Arc::new(EvaluationExecutor::new(evaluation_id.clone(), ctx));
    registry.register(evaluation_id.clone(), executor.clone());

    tokio::spawn(async move {
        let state = match executor.execute(job).await {
            Ok(state) => state,
            Err(_) => ExecutorState::Failed,
        };
        registry.unregister_if_same(&evaluation_id, &executor);
        state
    })
}

/// Submission, cancellation and query boundary over the store and registry.
#[derive(Clone)]
pub struct EvaluationService {
    ctx: ExecutorContext,
    registry: Arc<ExecutorRegistry>,
}

impl EvaluationService {
    pub fn new(ctx: ExecutorContext, registry: Arc<ExecutorRegistry>) -> Self {
        Self { ctx, registry }
    }

    pub fn context(&self) -> &ExecutorContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// Validates a raw request body and starts the run.
    pub fn submit(&self, input: &serde_json::Value) -> Result<Submission, ApiError> {
        let req = validate_create_evaluation(input)?;
        self.submit_request(req).map(|(submission, _)| submission)
    }

    /// Starts a validated request. Every model must exist and be active
    /// before any row is written.
    pub fn submit_request(
        &self,
        req: EvaluationRequest,
    ) -> Result<(Submission, JoinHandle<ExecutorState>), ApiError> {
        let store = &self.ctx.store;

        let mut models: Vec<ModelConfiguration> = Vec::with_capacity(req.model_ids.len());
        for model_id in &req.model_ids {
            match store.get_model(model_id) {
                Ok(Some(m)) if m.is_active => models.push(m),
                Ok(_) => {
                    return Err(ApiError::new(
                        ErrorCode::ModelInactive,
                        "Model is not active or does not exist",
                    )
                    .with_details(serde_json::json!({
                        "model_id": model_id,
                        "reason": "not_found_or_inactive",
                    })))
                }
                Err(e) => return Err(ApiError::internal(&e)),
            }
        }

        let evaluation = store
            .insert_evaluation(&req.evaluation)
            .map_err(|e| ApiError::internal(&e))?;
        for m in &models {
            store
                .insert_result(&evaluation.id, &m.id)
                .map_err(|e| ApiError::internal(&e))?;
        }

        let job = EvaluationJob {
            evaluation_id: evaluation.id.clone(),
            model_ids: req.model_ids.clone(),
            instruction: evaluation.instruction_text.clone(),
            rubric: evaluation.accuracy_rubric,
            expected_output: evaluation.expected_output.clone(),
            partial_credit_concepts: evaluation.partial_credit_concepts.clone(),
            system_prompt: evaluation.system_prompt.clone(),
            temperature: req.evaluation.temperature,
        };
        let handle = start_evaluation(self.registry.clone(), self.ctx.clone(), job);

        tracing::info!(
            event = "evaluation_submitted",
            evaluation_id = %evaluation.id,
            models = models.len(),
            template_id = ?evaluation.template_id,
        );

        let submission = Submission {
            evaluation_id: evaluation.id,
            status: EvaluationStatus::Pending,
            models: models
                .into_iter()
                .map(|m| SubmittedModel {
                    model_id: m.id,
                    model_name: m.model_name,
                    provider: m.provider,
                    status: ResultStatus::Pending,
                })
                .collect(),
        };
        Ok((submission, handle))
    }

    /// Starts a run from a stored template and bumps its run counter.
    pub fn run_template(
        &self,
        template_id: &str,
    ) -> Result<(Submission, JoinHandle<ExecutorState>), ApiError> {
        let store = &self.ctx.store;
        let template = store
            .get_template(template_id)
            .map_err(|e| ApiError::internal(&e))?
            .ok_or_else(|| ApiError::not_found("Template"))?;

        let req = EvaluationRequest {
            evaluation: crate::model::NewEvaluation {
                instruction_text: template.instruction_text,
                accuracy_rubric: template.accuracy_rubric,
                expected_output: template.expected_output,
                partial_credit_concepts: template.partial_credit_concepts,
                template_id: Some(template.id.clone()),
                system_prompt: template.system_prompt,
                temperature: template.temperature,
            },
            model_ids: template.model_ids,
        };
        let started = self.submit_request(req)?;
        store
            .increment_template_runs(&template.id)
            .map_err(|e| ApiError::internal(&e))?;
        Ok(started)
    }

    /// `Ok(false)` when no live run exists for the id.
    pub fn cancel(&self, evaluation_id: &str) -> anyhow::Result<bool> {
        self.registry.cancel(evaluation_id)
    }

    pub fn get(&self, evaluation_id: &str) -> anyhow::Result<Option<EvaluationDetail>> {
        let store = &self.ctx.store;
        let Some(evaluation) = store.get_evaluation(evaluation_id)? else {
            return Ok(None);
        };
        let results = store.get_results_with_models(evaluation_id)?;
        Ok(Some(EvaluationDetail {
            evaluation,
            results,
            running: self.registry.lookup(evaluation_id).is_some(),
        }))
    }

    pub fn status(&self, evaluation_id: &str) -> anyhow::Result<Option<StatusView>> {
        let store = &self.ctx.store;
        let Some(evaluation) = store.get_evaluation(evaluation_id)? else {
            return Ok(None);
        };
        let results = store.get_results(evaluation_id)?;
        let count = |s: ResultStatus| results.iter().filter(|r| r.status == s).count();
        Ok(Some(StatusView {
            evaluation_id: evaluation.id,
            status: evaluation.status,
            error_message: evaluation.error_message,
            pending: count(ResultStatus::Pending),
            completed: count(ResultStatus::Completed),
            failed: count(ResultStatus::Failed),
            running: self.registry.lookup(evaluation_id).is_some(),
        }))
    }
}
