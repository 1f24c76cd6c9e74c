use crate::config::ExecutorSettings;
use crate::errors::UnitError;
use crate::model::{
    AccuracyScore, EvaluationJob, EvaluationStatus, ModelResponse, ResultStatus, ResultUpdate,
};
use crate::providers::factory::ClientFactory;
use crate::providers::EvaluateOptions;
use crate::scoring::Scorer;
use crate::storage::Store;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub const CANCELLED_MESSAGE: &str = "Cancelled by user";
pub const ALL_FAILED_MESSAGE: &str = "All models failed";
pub const RESULT_TIMEOUT_MESSAGE: &str = "Timeout";

/// Collaborators shared by every run.
#[derive(Clone)]
pub struct ExecutorContext {
    pub store: Store,
    pub factory: Arc<dyn ClientFactory>,
    pub scorer: Arc<dyn Scorer>,
    pub settings: ExecutorSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Created,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl ExecutorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutorState::Completed | ExecutorState::Failed | ExecutorState::Aborted
        )
    }
}

/// How one model's unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Completed,
    Failed,
    /// Nothing written: the run was aborted or the row had already left pending.
    Discarded,
}

/// Runs one evaluation: fan-out, per-model and whole-run deadlines,
/// aggregation, cancellation. Single use.
pub struct EvaluationExecutor {
    evaluation_id: String,
    ctx: ExecutorContext,
    abort: CancellationToken,
    state: Mutex<ExecutorState>,
}

impl EvaluationExecutor {
    pub fn new(evaluation_id: impl Into<String>, ctx: ExecutorContext) -> Self {
        Self {
            evaluation_id: evaluation_id.into(),
            ctx,
            abort: CancellationToken::new(),
            state: Mutex::new(ExecutorState::Created),
        }
    }

    pub fn evaluation_id(&self) -> &str {
        &self.evaluation_id
    }

    pub fn state(&self) -> ExecutorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    fn set_state(&self, next: ExecutorState) {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // an abort sticks
        if *s != ExecutorState::Aborted {
            *s = next;
        }
    }

    /// Created -> Running. `Ok(false)` when aborted before the start.
    fn begin(&self) -> anyhow::Result<bool> {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *s {
            ExecutorState::Created => {
                *s = ExecutorState::Running;
                Ok(true)
            }
            ExecutorState::Aborted => Ok(false),
            other => anyhow::bail!(
                "executor for evaluation {} already used (state {:?})",
                self.evaluation_id,
                other
            ),
        }
    }

    /// Stops the run. Units still in flight are abandoned; nothing they
    /// produce is written. The evaluation is failed unless it already
    /// reached a terminal status.
    pub fn abort(&self) -> anyhow::Result<()> {
        {
            let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(*s, ExecutorState::Created | ExecutorState::Running) {
                *s = ExecutorState::Aborted;
            }
        }
        self.abort.cancel();

        let changed = self.ctx.store.update_evaluation_status(
            &self.evaluation_id,
            EvaluationStatus::Failed,
            Some(CANCELLED_MESSAGE),
        )?;
        tracing::info!(
            event = "evaluation_cancelled",
            evaluation_id = %self.evaluation_id,
            status_changed = changed,
        );
        Ok(())
    }

    pub async fn execute(&self, job: EvaluationJob) -> anyhow::Result<ExecutorState> {
        if job.evaluation_id != self.evaluation_id {
            anyhow::bail!(
                "job for evaluation {} handed to executor for {}",
                job.evaluation_id,
                self.evaluation_id
            );
        }
        if !self.begin()? {
            return Ok(ExecutorState::Aborted);
        }

        match self.run(job).await {
            Ok(state) => {
                self.set_state(state);
                Ok(self.state())
            }
            Err(e) => {
                if !self.is_aborted() {
                    let msg = e.to_string();
                    if let Err(write_err) = self.ctx.store.update_evaluation_status(
                        &self.evaluation_id,
                        EvaluationStatus::Failed,
                        Some(&msg),
                    ) {
                        tracing::error!(
                            event = "evaluation_status_write_failed",
                            evaluation_id = %self.evaluation_id,
                            error = %write_err,
                        );
                    }
                }
                self.set_state(ExecutorState::Failed);
                tracing::error!(
                    event = "evaluation_error",
                    evaluation_id = %self.evaluation_id,
                    error = %e,
                );
                Err(e)
            }
        }
    }

    async fn run(&self, job: EvaluationJob) -> anyhow::Result<ExecutorState> {
        let store = &self.ctx.store;
        let started = std::time::Instant::now();

        // The deadline is armed before anything else and dropped on every exit path.
        let deadline = tokio::time::sleep(self.ctx.settings.run_timeout);
        tokio::pin!(deadline);

        store.update_evaluation_status(&job.evaluation_id, EvaluationStatus::Running, None)?;
        tracing::info!(
            event = "evaluation_started",
            evaluation_id = %job.evaluation_id,
            models = job.model_ids.len(),
            rubric = %job.rubric,
        );

        let slots = self.claim_result_rows(&job)?;
        let job = Arc::new(job);

        let mut handles = Vec::with_capacity(slots.len());
        for (model_id, result_id) in slots {
            let unit = Unit {
                ctx: self.ctx.clone(),
                abort: self.abort.clone(),
                job: job.clone(),
                model_id,
                result_id: result_id.clone(),
            };
            handles.push((result_id, tokio::spawn(unit.run())));
        }

        let wait_all = async move {
            let mut outcomes = Vec::with_capacity(handles.len());
            for (result_id, h) in handles {
                match h.await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        tracing::error!(
                            event = "unit_join_error",
                            result_id = %result_id,
                            error = %e,
                        );
                        let update = ResultUpdate::Failed {
                            error_message: format!("join error: {}", e),
                        };
                        if let Err(e) = store.update_result(&result_id, &update) {
                            tracing::error!(event = "result_write_failed", result_id = %result_id, error = %e);
                        }
                        outcomes.push(UnitOutcome::Failed);
                    }
                }
            }
            outcomes
        };

        let outcomes = tokio::select! {
            outcomes = wait_all => outcomes,
            _ = &mut deadline => {
                self.handle_timeout(&job.evaluation_id)?;
                return Ok(ExecutorState::Failed);
            }
            _ = self.abort.cancelled() => {
                return Ok(ExecutorState::Aborted);
            }
        };

        if self.is_aborted() {
            return Ok(ExecutorState::Aborted);
        }

        let completed = store
            .get_results(&job.evaluation_id)?
            .iter()
            .filter(|r| r.status == ResultStatus::Completed)
            .count();

        let state = if completed > 0 {
            store.update_evaluation_status(&job.evaluation_id, EvaluationStatus::Completed, None)?;
            ExecutorState::Completed
        } else {
            store.update_evaluation_status(
                &job.evaluation_id,
                EvaluationStatus::Failed,
                Some(ALL_FAILED_MESSAGE),
            )?;
            ExecutorState::Failed
        };

        tracing::info!(
            event = "evaluation_finished",
            evaluation_id = %job.evaluation_id,
            status = ?state,
            completed,
            failed = outcomes.iter().filter(|o| **o == UnitOutcome::Failed).count(),
            duration_ms = started.elapsed().as_millis() as u64,
        );
        Ok(state)
    }

    /// Pairs each requested model with its pending result row, creating rows
    /// that are missing so every model ends up with exactly one.
    fn claim_result_rows(&self, job: &EvaluationJob) -> anyhow::Result<Vec<(String, String)>> {
        let mut unclaimed = self.ctx.store.get_results(&job.evaluation_id)?;
        let mut slots = Vec::with_capacity(job.model_ids.len());
        for model_id in &job.model_ids {
            let result_id = match unclaimed.iter().position(|r| &r.model_id == model_id) {
                Some(idx) => unclaimed.swap_remove(idx).id,
                None => self.ctx.store.insert_result(&job.evaluation_id, model_id)?,
            };
            slots.push((model_id.clone(), result_id));
        }
        Ok(slots)
    }

    fn handle_timeout(&self, evaluation_id: &str) -> anyhow::Result<()> {
        self.abort.cancel();
        let message = format!(
            "Evaluation timed out after {}",
            human_duration(self.ctx.settings.run_timeout)
        );
        self.ctx
            .store
            .update_evaluation_status(evaluation_id, EvaluationStatus::Failed, Some(&message))?;
        let forced = self
            .ctx
            .store
            .fail_pending_results(evaluation_id, RESULT_TIMEOUT_MESSAGE)?;
        tracing::warn!(
            event = "evaluation_timeout",
            evaluation_id = %evaluation_id,
            timeout_ms = self.ctx.settings.run_timeout.as_millis() as u64,
            forced_results = forced,
        );
        Ok(())
    }
}

struct Unit {
    ctx: ExecutorContext,
    abort: CancellationToken,
    job: Arc<EvaluationJob>,
    model_id: String,
    result_id: String,
}

impl Unit {
    async fn run(self) -> UnitOutcome {
        let outcome = self.call_and_score().await;

        let update = match outcome {
            Ok(None) => return UnitOutcome::Discarded,
            Ok(Some((response, score))) => {
                tracing::info!(
                    event = "model_completed",
                    evaluation_id = %self.job.evaluation_id,
                    model_id = %self.model_id,
                    score = score.score,
                    duration_ms = response.execution_time_ms,
                );
                ResultUpdate::Completed {
                    response,
                    score,
                    system_prompt_used: self.job.system_prompt.clone(),
                    temperature_used: self.job.temperature_used(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    event = "model_failed",
                    evaluation_id = %self.job.evaluation_id,
                    model_id = %self.model_id,
                    kind = e.kind().as_str(),
                    error = %e,
                );
                ResultUpdate::Failed {
                    error_message: e.to_string(),
                }
            }
        };

        if self.abort.is_cancelled() {
            return UnitOutcome::Discarded;
        }
        let wrote_completed = matches!(update, ResultUpdate::Completed { .. });
        match self.ctx.store.update_result(&self.result_id, &update) {
            Ok(true) if wrote_completed => UnitOutcome::Completed,
            Ok(true) => UnitOutcome::Failed,
            Ok(false) => UnitOutcome::Discarded,
            Err(e) => {
                tracing::error!(
                    event = "result_write_failed",
                    evaluation_id = %self.job.evaluation_id,
                    result_id = %self.result_id,
                    error = %e,
                );
                UnitOutcome::Failed
            }
        }
    }

    /// `Ok(None)` when the run was aborted while this unit was waiting.
    async fn call_and_score(&self) -> Result<Option<(ModelResponse, AccuracyScore)>, UnitError> {
        let model = self
            .ctx
            .store
            .get_model(&self.model_id)?
            .ok_or(UnitError::ModelNotFound)?;
        if !model.is_active {
            return Err(UnitError::ModelInactive);
        }

        let api_key = self.ctx.store.decrypt_api_key(&model.api_key_encrypted)?;
        let client = self
            .ctx
            .factory
            .create(model.provider.as_str(), &api_key, &model.model_name)?;

        let opts = EvaluateOptions {
            system_prompt: self.job.system_prompt.clone(),
            temperature: self.job.temperature,
        };
        let response = match timeout(
            self.ctx.settings.model_timeout,
            client.evaluate(&self.job.instruction, &opts),
        )
        .await
        {
            Ok(r) => r?,
            Err(_) => return Err(UnitError::Timeout),
        };

        if self.abort.is_cancelled() {
            return Ok(None);
        }

        let score = self
            .ctx
            .scorer
            .score(
                self.job.rubric,
                &response.response_text,
                self.job.expected_output.as_deref(),
                self.job.partial_credit_concepts.as_deref(),
            )
            .await
            .map_err(|e| UnitError::Scoring(e.to_string()))?;

        Ok(Some((response, score)))
    }
}

/// "5 minutes", "1 minute", "90 seconds".
pub fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if secs >= 1 {
        format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
    } else {
        format!("{} ms", d.as_millis())
    }
}
