use quorum_core::config::ExecutorSettings;
use quorum_core::engine::{EvaluationService, ExecutorContext, ExecutorRegistry};
use quorum_core::providers::fake::{FakeBehavior, FakeFactory};
use quorum_core::storage::Store;
use quorum_server::methods::MethodContext;
use quorum_server::server::Server;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn server(factory: FakeFactory) -> Server {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    let ctx = ExecutorContext {
        store,
        factory: Arc::new(factory),
        scorer: quorum_metrics::default_scorer(),
        settings: ExecutorSettings::default(),
    };
    let service = EvaluationService::new(ctx, Arc::new(ExecutorRegistry::new()));
    Server::new(MethodContext { service }, 1_000_000)
}

async fn call(server: &Server, method: &str, params: Value) -> Value {
    let line = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
    let resp = server
        .handle_line(&line.to_string())
        .await
        .expect("request with id gets a response");
    serde_json::to_value(resp).unwrap()
}

async fn ok(server: &Server, method: &str, params: Value) -> Value {
    let resp = call(server, method, params).await;
    assert!(resp.get("error").is_none(), "{method} failed: {resp}");
    resp["result"].clone()
}

async fn add_model(server: &Server, provider: &str, name: &str, key: &str) -> String {
    let m = ok(
        server,
        "models.create",
        json!({ "provider": provider, "model_name": name, "api_key": key }),
    )
    .await;
    m["id"].as_str().unwrap().to_string()
}

async fn wait_finished(server: &Server, evaluation_id: &str) -> Value {
    for _ in 0..200 {
        let st = ok(server, "evaluations.status", json!({ "evaluation_id": evaluation_id })).await;
        if !st["running"].as_bool().unwrap() && st["status"] != "pending" && st["status"] != "running" {
            return st;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("evaluation {evaluation_id} did not finish");
}

#[tokio::test]
async fn test_initialize_lists_methods() {
    let s = server(FakeFactory::default());
    let r = ok(&s, "initialize", json!({})).await;
    assert_eq!(r["serverInfo"]["name"], "quorum-server");
    let methods = r["methods"].as_array().unwrap();
    assert!(methods.iter().any(|m| m == "evaluations.submit"));
    assert!(methods.iter().any(|m| m == "templates.run"));
}

#[tokio::test]
async fn test_unknown_method_and_notifications() {
    let s = server(FakeFactory::default());
    let r = call(&s, "models.explode", json!({})).await;
    assert_eq!(r["error"]["code"], -32601);

    let note = json!({ "jsonrpc": "2.0", "method": "models.list" }).to_string();
    assert!(s.handle_line(&note).await.is_none());
    assert!(s.handle_line("{not json").await.is_none());
    assert!(s.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn test_oversize_line_is_rejected() {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    let ctx = ExecutorContext {
        store,
        factory: Arc::new(FakeFactory::default()),
        scorer: quorum_metrics::default_scorer(),
        settings: ExecutorSettings::default(),
    };
    let service = EvaluationService::new(ctx, Arc::new(ExecutorRegistry::new()));
    let s = Server::new(MethodContext { service }, 64);

    let line = json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": { "pad": "x".repeat(100) } });
    let resp = serde_json::to_value(s.handle_line(&line.to_string()).await.unwrap()).unwrap();
    assert_eq!(resp["error"]["code"], -32600);
    assert_eq!(resp["error"]["data"]["code"], "E_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn test_model_lifecycle() {
    let factory = FakeFactory::default().script("broken", FakeBehavior::fail("401"));
    let s = server(factory);

    let created = ok(
        &s,
        "models.create",
        json!({ "provider": "openai", "model_name": "gpt-4o", "api_key": "sk-test-123", "notes": "main" }),
    )
    .await;
    assert_eq!(created["validation_status"], "valid");
    assert_eq!(created["is_active"], true);
    assert!(created.get("api_key_encrypted").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let broken = ok(
        &s,
        "models.create",
        json!({ "provider": "anthropic", "model_name": "broken", "api_key": "sk-ant-x" }),
    )
    .await;
    assert_eq!(broken["validation_status"], "invalid");

    let bad = call(
        &s,
        "models.create",
        json!({ "provider": "anthropic", "model_name": "c", "api_key": "sk-wrong" }),
    )
    .await;
    assert_eq!(bad["error"]["data"]["error"], "INVALID_API_KEY");
    assert_eq!(bad["error"]["data"]["field"], "api_key");

    let bad = call(&s, "models.create", json!({ "provider": "azure", "model_name": "c", "api_key": "k" })).await;
    assert_eq!(bad["error"]["data"]["error"], "INVALID_PROVIDER");

    let updated = ok(&s, "models.update", json!({ "model_id": id, "is_active": false })).await;
    assert_eq!(updated["is_active"], false);
    let wrong_key = call(&s, "models.update", json!({ "model_id": id, "api_key": "no-prefix" })).await;
    assert_eq!(wrong_key["error"]["data"]["error"], "INVALID_API_KEY");

    let active = ok(&s, "models.list", json!({ "active_only": true })).await;
    assert_eq!(active["models"].as_array().unwrap().len(), 1);
    let all = ok(&s, "models.list", json!({})).await;
    assert_eq!(all["models"].as_array().unwrap().len(), 2);
    assert_eq!(all["models"][0]["usage_count"], 0);
    let openai = ok(&s, "models.list", json!({ "provider": "openai" })).await;
    assert_eq!(openai["models"].as_array().unwrap().len(), 1);

    let tested = ok(&s, "models.test", json!({ "model_id": id })).await;
    assert_eq!(tested["success"], true);

    let deleted = ok(&s, "models.delete", json!({ "model_id": id })).await;
    assert_eq!(deleted["deleted"], true);
    let again = call(&s, "models.delete", json!({ "model_id": id })).await;
    assert_eq!(again["error"]["code"], -32004);
    assert_eq!(again["error"]["data"]["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_submit_and_inspect_evaluation() {
    let factory = FakeFactory::default()
        .script("right", FakeBehavior::respond("42"))
        .script("wrong", FakeBehavior::respond("41"))
        .script("down", FakeBehavior::fail("rate limited"));
    let s = server(factory);
    let right = add_model(&s, "openai", "right", "sk-a").await;
    let wrong = add_model(&s, "google", "wrong", "google-key-0123456789").await;
    let down = add_model(&s, "anthropic", "down", "sk-ant-b").await;

    let sub = ok(
        &s,
        "evaluations.submit",
        json!({
            "instruction": "What is 6 x 7?",
            "rubric_type": "exact_match",
            "expected_output": "42",
            "model_ids": [right, wrong, down],
        }),
    )
    .await;
    assert_eq!(sub["status"], "pending");
    assert_eq!(sub["models"].as_array().unwrap().len(), 3);
    let eval_id = sub["evaluation_id"].as_str().unwrap().to_string();

    let st = wait_finished(&s, &eval_id).await;
    assert_eq!(st["status"], "completed");
    assert_eq!(st["completed"], 2);
    assert_eq!(st["failed"], 1);

    let detail = ok(&s, "evaluations.get", json!({ "evaluation_id": eval_id })).await;
    let results = detail["results"].as_array().unwrap();
    let by_model = |id: &str| results.iter().find(|r| r["model_id"] == id).unwrap().clone();
    assert_eq!(by_model(&right)["accuracy_score"], 1.0);
    assert_eq!(by_model(&wrong)["accuracy_score"], 0.0);
    assert_eq!(by_model(&down)["error_message"], "rate limited");
    assert_eq!(by_model(&down)["provider"], "anthropic");

    let page = ok(&s, "evaluations.list", json!({ "limit": 5 })).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["page"], 1);
    assert_eq!(page["page_size"], 5);
    assert_eq!(page["items"][0]["result_count"], 3);

    let cancelled = ok(&s, "evaluations.cancel", json!({ "evaluation_id": eval_id })).await;
    assert_eq!(cancelled["cancelled"], false);

    let missing = call(&s, "evaluations.get", json!({ "evaluation_id": "nope" })).await;
    assert_eq!(missing["error"]["data"]["error"], "NOT_FOUND");

    let bad = call(&s, "evaluations.delete", json!({ "ids": [] })).await;
    assert_eq!(bad["error"]["data"]["error"], "INVALID_INPUT");
    let gone = ok(&s, "evaluations.delete", json!({ "ids": [eval_id] })).await;
    assert_eq!(gone["deleted"], 1);
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let s = server(FakeFactory::default());
    let id = add_model(&s, "openai", "m", "sk-a").await;

    let r = call(
        &s,
        "evaluations.submit",
        json!({ "instruction": "x", "rubric_type": "vibes", "model_ids": [id] }),
    )
    .await;
    assert_eq!(r["error"]["data"]["error"], "INVALID_RUBRIC");

    let r = call(
        &s,
        "evaluations.submit",
        json!({ "instruction": "x", "rubric_type": "partial_credit", "model_ids": [id] }),
    )
    .await;
    assert_eq!(r["error"]["data"]["error"], "MISSING_RUBRIC_CONFIG");

    ok(&s, "models.update", json!({ "model_id": id, "is_active": false })).await;
    let r = call(
        &s,
        "evaluations.submit",
        json!({ "instruction": "x", "rubric_type": "exact_match", "expected_output": "y", "model_ids": [id] }),
    )
    .await;
    assert_eq!(r["error"]["data"]["error"], "MODEL_INACTIVE");
    assert_eq!(r["error"]["data"]["details"]["model_id"], id.as_str());
}

#[tokio::test]
async fn test_templates() {
    let s = server(FakeFactory::new(FakeBehavior::respond("ownership and borrowing")));
    let id = add_model(&s, "openai", "m", "sk-a").await;

    let t = ok(
        &s,
        "templates.create",
        json!({
            "name": "memory",
            "instruction_text": "Explain Rust memory management",
            "accuracy_rubric": "partial_credit",
            "partial_credit_concepts": ["ownership", "borrowing", "lifetimes"],
            "model_ids": [id],
        }),
    )
    .await;
    let template_id = t["id"].as_str().unwrap().to_string();
    assert!(t["temperature"].is_null());

    let sub = ok(&s, "templates.run", json!({ "template_id": template_id })).await;
    let eval_id = sub["evaluation_id"].as_str().unwrap().to_string();
    let st = wait_finished(&s, &eval_id).await;
    assert_eq!(st["status"], "completed");

    let listed = ok(&s, "templates.list", json!({})).await;
    assert_eq!(listed["templates"][0]["run_count"], 1);

    let detail = ok(&s, "evaluations.get", json!({ "evaluation_id": eval_id })).await;
    assert_eq!(detail["template_id"], template_id.as_str());
    assert_eq!(detail["results"][0]["accuracy_score"], 0.667);

    let by_template = ok(&s, "evaluations.list", json!({ "template": template_id })).await;
    assert_eq!(by_template["total"], 1);

    ok(&s, "templates.delete", json!({ "template_id": template_id })).await;
    let r = call(&s, "templates.run", json!({ "template_id": template_id })).await;
    assert_eq!(r["error"]["data"]["error"], "NOT_FOUND");
}
