use async_trait::async_trait;
use quorum_core::config::ExecutorSettings;
use quorum_core::crypto::CredentialCipher;
use quorum_core::engine::{
    start_evaluation, EvaluationExecutor, EvaluationService, ExecutorContext, ExecutorRegistry,
    ExecutorState,
};
use quorum_core::errors::ErrorCode;
use quorum_core::model::{
    AccuracyScore, EvaluationFilter, EvaluationJob, EvaluationStatus, ModelPatch, NewEvaluation,
    NewTemplate, Provider, ResultRow, ResultStatus, RubricKind,
};
use quorum_core::providers::fake::{FakeBehavior, FakeFactory};
use quorum_core::scoring::Scorer;
use quorum_core::storage::Store;
use std::sync::Arc;
use std::time::Duration;

/// 1.0 on a trimmed exact match, else 0.0.
struct MatchScorer;

#[async_trait]
impl Scorer for MatchScorer {
    async fn score(
        &self,
        _rubric: RubricKind,
        produced: &str,
        expected: Option<&str>,
        _concepts: Option<&[String]>,
    ) -> anyhow::Result<AccuracyScore> {
        let hit = expected.is_some_and(|e| e.trim() == produced.trim());
        Ok(AccuracyScore {
            score: if hit { 1.0 } else { 0.0 },
            reasoning: if hit { "match".into() } else { "no match".into() },
        })
    }
}

/// Refuses responses containing "unscorable", defers to `MatchScorer` otherwise.
struct PickyScorer;

#[async_trait]
impl Scorer for PickyScorer {
    async fn score(
        &self,
        rubric: RubricKind,
        produced: &str,
        expected: Option<&str>,
        concepts: Option<&[String]>,
    ) -> anyhow::Result<AccuracyScore> {
        if produced.contains("unscorable") {
            anyhow::bail!("unscorable response");
        }
        MatchScorer.score(rubric, produced, expected, concepts).await
    }
}

struct Harness {
    store: Store,
    factory: FakeFactory,
    ctx: ExecutorContext,
    registry: Arc<ExecutorRegistry>,
}

impl Harness {
    fn new(factory: FakeFactory) -> Self {
        Self::with_settings(factory, ExecutorSettings::default())
    }

    fn with_settings(factory: FakeFactory, settings: ExecutorSettings) -> Self {
        Self::with_store(factory, settings, Store::memory().unwrap())
    }

    fn with_store(factory: FakeFactory, settings: ExecutorSettings, store: Store) -> Self {
        store.init_schema().unwrap();
        let ctx = ExecutorContext {
            store: store.clone(),
            factory: Arc::new(factory.clone()),
            scorer: Arc::new(MatchScorer),
            settings,
        };
        Self {
            store,
            factory,
            ctx,
            registry: Arc::new(ExecutorRegistry::new()),
        }
    }

    fn model(&self, provider: Provider, name: &str) -> String {
        self.store
            .insert_model(provider, name, &format!("sk-{}-key", name), None)
            .unwrap()
            .id
    }

    /// Evaluation row plus one pending result per model, as a submission would leave them.
    fn job(&self, model_ids: &[String], system_prompt: Option<&str>, temperature: Option<f64>) -> EvaluationJob {
        let e = self
            .store
            .insert_evaluation(&NewEvaluation {
                instruction_text: "What is 6 x 7?".into(),
                accuracy_rubric: RubricKind::ExactMatch,
                expected_output: Some("42".into()),
                partial_credit_concepts: None,
                template_id: None,
                system_prompt: system_prompt.map(str::to_string),
                temperature,
            })
            .unwrap();
        for id in model_ids {
            self.store.insert_result(&e.id, id).unwrap();
        }
        EvaluationJob {
            evaluation_id: e.id,
            model_ids: model_ids.to_vec(),
            instruction: e.instruction_text,
            rubric: e.accuracy_rubric,
            expected_output: e.expected_output,
            partial_credit_concepts: None,
            system_prompt: e.system_prompt,
            temperature,
        }
    }

    async fn execute(&self, job: EvaluationJob) -> ExecutorState {
        let exec = EvaluationExecutor::new(job.evaluation_id.clone(), self.ctx.clone());
        exec.execute(job).await.unwrap()
    }

    fn result_for(&self, evaluation_id: &str, model_id: &str) -> ResultRow {
        self.store
            .get_results(evaluation_id)
            .unwrap()
            .into_iter()
            .find(|r| r.model_id == model_id)
            .unwrap()
    }

    fn status(&self, evaluation_id: &str) -> (EvaluationStatus, Option<String>) {
        let e = self.store.get_evaluation(evaluation_id).unwrap().unwrap();
        (e.status, e.error_message)
    }
}

#[tokio::test]
async fn test_mixed_outcomes_complete_the_evaluation() {
    let factory = FakeFactory::default()
        .script("model-a", FakeBehavior::respond("42"))
        .script("model-b", FakeBehavior::fail("rate limited"));
    let h = Harness::new(factory);
    let a = h.model(Provider::Openai, "model-a");
    let b = h.model(Provider::Anthropic, "model-b");
    let job = h.job(&[a.clone(), b.clone()], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Completed);
    assert_eq!(h.status(&id), (EvaluationStatus::Completed, None));

    let ra = h.result_for(&id, &a);
    assert_eq!(ra.status, ResultStatus::Completed);
    assert_eq!(ra.accuracy_score, Some(1.0));
    assert_eq!(ra.response_text.as_deref(), Some("42"));

    let rb = h.result_for(&id, &b);
    assert_eq!(rb.status, ResultStatus::Failed);
    assert_eq!(rb.error_message.as_deref(), Some("rate limited"));
    assert_eq!(rb.accuracy_score, None);

    let e = h.store.get_evaluation(&id).unwrap().unwrap();
    assert!(e.completed_at.is_some());
}

#[tokio::test]
async fn test_zero_scores_still_complete() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::respond("forty-two")));
    let a = h.model(Provider::Google, "model-a");
    let job = h.job(&[a.clone()], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Completed);
    assert_eq!(h.result_for(&id, &a).accuracy_score, Some(0.0));
}

#[tokio::test]
async fn test_all_failed() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::fail("503 Service Unavailable")));
    let a = h.model(Provider::Openai, "model-a");
    let b = h.model(Provider::Google, "model-b");
    let job = h.job(&[a, b], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Failed);
    assert_eq!(
        h.status(&id),
        (EvaluationStatus::Failed, Some("All models failed".into()))
    );
    assert!(h
        .store
        .get_results(&id)
        .unwrap()
        .iter()
        .all(|r| r.status == ResultStatus::Failed));
}

#[tokio::test]
async fn test_inactive_model_is_never_called() {
    let h = Harness::new(FakeFactory::default());
    let a = h.model(Provider::Openai, "model-a");
    h.store
        .update_model(&a, &ModelPatch {
            is_active: Some(false),
            ..Default::default()
        })
        .unwrap();
    let job = h.job(&[a.clone()], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Failed);
    assert_eq!(
        h.result_for(&id, &a).error_message.as_deref(),
        Some("Model is inactive")
    );
    assert_eq!(h.status(&id).1.as_deref(), Some("All models failed"));
    assert!(h.factory.calls().is_empty());
}

#[tokio::test]
async fn test_missing_model() {
    let h = Harness::new(FakeFactory::default());
    let ghost = "00000000-0000-4000-8000-000000000000".to_string();
    let job = h.job(&[ghost.clone()], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Failed);
    assert_eq!(
        h.result_for(&id, &ghost).error_message.as_deref(),
        Some("Model not found")
    );
}

#[tokio::test(start_paused = true)]
async fn test_per_model_timeout_leaves_siblings_alone() {
    let factory = FakeFactory::default()
        .script("slow", FakeBehavior::Hang)
        .script("fast", FakeBehavior::respond("42").after(Duration::from_secs(2)));
    let h = Harness::new(factory);
    let slow = h.model(Provider::Openai, "slow");
    let fast = h.model(Provider::Anthropic, "fast");
    let job = h.job(&[slow.clone(), fast.clone()], None, None);
    let id = job.evaluation_id.clone();

    let started = tokio::time::Instant::now();
    assert_eq!(h.execute(job).await, ExecutorState::Completed);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));

    assert_eq!(
        h.result_for(&id, &slow).error_message.as_deref(),
        Some("Model timeout")
    );
    assert_eq!(h.result_for(&id, &fast).status, ResultStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_forces_pending_results() {
    let settings = ExecutorSettings {
        model_timeout: Duration::from_secs(600),
        run_timeout: Duration::from_secs(300),
    };
    let factory = FakeFactory::default()
        .script("stuck", FakeBehavior::Hang)
        .script("quick", FakeBehavior::respond("42"));
    let h = Harness::with_settings(factory, settings);
    let stuck = h.model(Provider::Google, "stuck");
    let quick = h.model(Provider::Openai, "quick");
    let job = h.job(&[stuck.clone(), quick.clone()], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Failed);
    assert_eq!(
        h.status(&id),
        (
            EvaluationStatus::Failed,
            Some("Evaluation timed out after 5 minutes".into())
        )
    );
    let r = h.result_for(&id, &stuck);
    assert_eq!(r.status, ResultStatus::Failed);
    assert_eq!(r.error_message.as_deref(), Some("Timeout"));
    // settled before the deadline, so untouched
    assert_eq!(h.result_for(&id, &quick).status, ResultStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_abort_discards_in_flight_units() {
    let h = Harness::new(FakeFactory::new(
        FakeBehavior::respond("42").after(Duration::from_secs(10)),
    ));
    let a = h.model(Provider::Openai, "model-a");
    let b = h.model(Provider::Anthropic, "model-b");
    let job = h.job(&[a.clone(), b.clone()], None, None);
    let id = job.evaluation_id.clone();

    let handle = start_evaluation(h.registry.clone(), h.ctx.clone(), job);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.status(&id).0, EvaluationStatus::Running);

    assert!(h.registry.cancel(&id).unwrap());
    assert!(h.registry.lookup(&id).is_none());
    assert_eq!(handle.await.unwrap(), ExecutorState::Aborted);

    // let the abandoned calls finish
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(
        h.status(&id),
        (EvaluationStatus::Failed, Some("Cancelled by user".into()))
    );
    for r in h.store.get_results(&id).unwrap() {
        assert_eq!(r.status, ResultStatus::Pending);
    }
    assert!(!h.registry.cancel(&id).unwrap());
}

#[tokio::test]
async fn test_abort_before_start_runs_nothing() {
    let h = Harness::new(FakeFactory::default());
    let a = h.model(Provider::Openai, "model-a");
    let job = h.job(&[a], None, None);
    let id = job.evaluation_id.clone();

    let exec = EvaluationExecutor::new(id.clone(), h.ctx.clone());
    exec.abort().unwrap();
    assert_eq!(exec.execute(job).await.unwrap(), ExecutorState::Aborted);
    assert!(h.factory.calls().is_empty());
    assert_eq!(h.status(&id).1.as_deref(), Some("Cancelled by user"));
}

#[tokio::test]
async fn test_abort_after_completion_keeps_verdict() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::respond("42")));
    let a = h.model(Provider::Openai, "model-a");
    let job = h.job(&[a], None, None);
    let id = job.evaluation_id.clone();

    let exec = EvaluationExecutor::new(id.clone(), h.ctx.clone());
    assert_eq!(exec.execute(job).await.unwrap(), ExecutorState::Completed);
    exec.abort().unwrap();
    assert_eq!(exec.state(), ExecutorState::Completed);
    assert_eq!(h.status(&id), (EvaluationStatus::Completed, None));
}

#[tokio::test]
async fn test_executor_is_single_use() {
    let h = Harness::new(FakeFactory::default());
    let a = h.model(Provider::Openai, "model-a");
    let job = h.job(&[a], None, None);

    let exec = EvaluationExecutor::new(job.evaluation_id.clone(), h.ctx.clone());
    exec.execute(job.clone()).await.unwrap();
    assert!(exec.execute(job).await.is_err());
}

#[tokio::test]
async fn test_scoring_error_fails_only_that_unit() {
    let factory = FakeFactory::default()
        .script("model-a", FakeBehavior::respond("42"))
        .script("model-b", FakeBehavior::respond("an unscorable answer"));
    let mut h = Harness::new(factory);
    h.ctx.scorer = Arc::new(PickyScorer);
    let a = h.model(Provider::Openai, "model-a");
    let b = h.model(Provider::Google, "model-b");
    let job = h.job(&[a.clone(), b.clone()], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Completed);
    assert_eq!(h.status(&id), (EvaluationStatus::Completed, None));

    let ra = h.result_for(&id, &a);
    assert_eq!(ra.status, ResultStatus::Completed);
    assert_eq!(ra.accuracy_score, Some(1.0));

    let rb = h.result_for(&id, &b);
    assert_eq!(rb.status, ResultStatus::Failed);
    assert_eq!(rb.error_message.as_deref(), Some("Scoring failed: unscorable response"));
    assert_eq!(rb.accuracy_score, None);
    // the backend was called; only scoring failed
    assert_eq!(h.factory.calls().len(), 2);
}

#[tokio::test]
async fn test_unreadable_credential_fails_only_that_unit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quorum.db");

    let bad = {
        let writer = Store::open(&path, CredentialCipher::from_hex(&"11".repeat(32)).unwrap()).unwrap();
        writer.init_schema().unwrap();
        writer
            .insert_model(Provider::Anthropic, "model-bad", "sk-ant-bad", None)
            .unwrap()
            .id
    };

    let reader = Store::open(&path, CredentialCipher::from_hex(&"22".repeat(32)).unwrap()).unwrap();
    let h = Harness::with_store(
        FakeFactory::new(FakeBehavior::respond("42")),
        ExecutorSettings::default(),
        reader,
    );
    let good = h.model(Provider::Openai, "model-good");
    let job = h.job(&[bad.clone(), good.clone()], None, None);
    let id = job.evaluation_id.clone();

    assert_eq!(h.execute(job).await, ExecutorState::Completed);

    let rb = h.result_for(&id, &bad);
    assert_eq!(rb.status, ResultStatus::Failed);
    assert_eq!(rb.error_message.as_deref(), Some("failed to decrypt API key"));
    assert_eq!(h.result_for(&id, &good).status, ResultStatus::Completed);

    let calls = h.factory.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model_name, "model-good");
}

#[tokio::test]
async fn test_temperature_and_system_prompt_audit() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::respond("42")));
    let a = h.model(Provider::Anthropic, "model-a");
    let job = h.job(&[a.clone()], Some("You are a calculator"), None);
    let id = job.evaluation_id.clone();

    h.execute(job).await;

    let r = h.result_for(&id, &a);
    assert_eq!(r.temperature_used, Some(0.3));
    assert_eq!(r.system_prompt_used.as_deref(), Some("You are a calculator"));

    let calls = h.factory.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].opts.temperature, None);
    assert_eq!(calls[0].opts.system_prompt.as_deref(), Some("You are a calculator"));
    // decrypted credential reaches the client
    assert_eq!(calls[0].api_key, "sk-model-a-key");
    assert_eq!(calls[0].provider, "anthropic");
}

#[tokio::test]
async fn test_explicit_temperature_is_passed_and_recorded() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::respond("42")));
    let a = h.model(Provider::Openai, "model-a");
    let job = h.job(&[a.clone()], None, Some(1.1));
    let id = job.evaluation_id.clone();

    h.execute(job).await;
    assert_eq!(h.result_for(&id, &a).temperature_used, Some(1.1));
    assert_eq!(h.factory.calls()[0].opts.temperature, Some(1.1));
}

#[tokio::test]
async fn test_submit_creates_rows_then_runs_in_background() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::respond("42")));
    let ids: Vec<String> = ["m1", "m2", "m3"]
        .iter()
        .map(|n| h.model(Provider::Openai, n))
        .collect();
    let service = EvaluationService::new(h.ctx.clone(), h.registry.clone());

    let input = serde_json::json!({
        "instruction": "What is 6 x 7?",
        "model_ids": ids,
        "rubric_type": "exact_match",
        "expected_output": "42",
    });
    let req = quorum_core::validate::validate_create_evaluation(&input).unwrap();
    let (submission, handle) = service.submit_request(req).unwrap();

    assert_eq!(submission.status, EvaluationStatus::Pending);
    assert_eq!(submission.models.len(), 3);
    assert!(submission.models.iter().all(|m| m.status == ResultStatus::Pending));
    let rows = h.store.get_results(&submission.evaluation_id).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(h.registry.lookup(&submission.evaluation_id).is_some());

    assert_eq!(handle.await.unwrap(), ExecutorState::Completed);
    assert!(h.registry.is_empty());

    let status = service.status(&submission.evaluation_id).unwrap().unwrap();
    assert_eq!(status.completed, 3);
    assert!(!status.running);

    let detail = service.get(&submission.evaluation_id).unwrap().unwrap();
    assert_eq!(detail.results.len(), 3);
    assert!(detail.results.iter().all(|r| r.model_name.is_some()));
}

#[tokio::test]
async fn test_submit_rejects_inactive_models_before_writing() {
    let h = Harness::new(FakeFactory::default());
    let a = h.model(Provider::Openai, "model-a");
    let b = h.model(Provider::Openai, "model-b");
    h.store
        .update_model(&b, &ModelPatch {
            is_active: Some(false),
            ..Default::default()
        })
        .unwrap();
    let service = EvaluationService::new(h.ctx.clone(), h.registry.clone());

    let err = service
        .submit(&serde_json::json!({
            "instruction": "Hi",
            "model_ids": [&a, &b],
            "rubric_type": "exact_match",
            "expected_output": "Hello",
        }))
        .unwrap_err();
    assert_eq!(err.error, ErrorCode::ModelInactive);
    assert_eq!(err.details.unwrap()["model_id"], serde_json::json!(b));
    assert_eq!(
        h.store.count_evaluations(&EvaluationFilter::default()).unwrap(),
        0
    );
}

#[tokio::test]
async fn test_template_run_references_template() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::respond("bonjour")));
    let a = h.model(Provider::Google, "model-a");
    let service = EvaluationService::new(h.ctx.clone(), h.registry.clone());

    let tpl = h
        .store
        .insert_template(&NewTemplate {
            name: "French".into(),
            description: None,
            instruction_text: "Translate hello".into(),
            model_ids: vec![a.clone()],
            accuracy_rubric: RubricKind::ExactMatch,
            expected_output: Some("bonjour".into()),
            partial_credit_concepts: None,
            system_prompt: None,
            temperature: Some(0.9),
        })
        .unwrap();

    let (submission, handle) = service.run_template(&tpl.id).unwrap();
    handle.await.unwrap();

    let e = h.store.get_evaluation(&submission.evaluation_id).unwrap().unwrap();
    assert_eq!(e.template_id.as_deref(), Some(tpl.id.as_str()));
    assert_eq!(e.temperature, 0.9);
    assert_eq!(h.store.get_template(&tpl.id).unwrap().unwrap().run_count, 1);
    assert_eq!(h.result_for(&e.id, &a).temperature_used, Some(0.9));

    let err = service.run_template("missing").unwrap_err();
    assert_eq!(err.error, ErrorCode::NotFound);
}

#[tokio::test]
async fn test_template_without_temperature_sends_none() {
    let h = Harness::new(FakeFactory::new(FakeBehavior::respond("42")));
    let a = h.model(Provider::Openai, "model-a");
    let service = EvaluationService::new(h.ctx.clone(), h.registry.clone());

    let tpl = h
        .store
        .insert_template(&NewTemplate {
            name: "Arithmetic".into(),
            description: None,
            instruction_text: "What is 6 x 7?".into(),
            model_ids: vec![a.clone()],
            accuracy_rubric: RubricKind::ExactMatch,
            expected_output: Some("42".into()),
            partial_credit_concepts: None,
            system_prompt: None,
            temperature: None,
        })
        .unwrap();
    assert_eq!(tpl.temperature, None);

    let (submission, handle) = service.run_template(&tpl.id).unwrap();
    handle.await.unwrap();

    assert_eq!(h.factory.calls()[0].opts.temperature, None);
    let r = h.result_for(&submission.evaluation_id, &a);
    assert_eq!(r.temperature_used, Some(0.3));
}
