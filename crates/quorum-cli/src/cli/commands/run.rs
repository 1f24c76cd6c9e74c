use super::{exit_codes, report_api_error};
use crate::cli::args::{RunArgs, ShowArgs};
use quorum_core::engine::service::EvaluationDetail;
use quorum_core::engine::EvaluationService;
use quorum_core::model::{EvaluationStatus, ResultStatus};
use quorum_core::validate::validate_create_evaluation;

/// Submits, waits for the run to settle, prints the verdict.
/// Ctrl-C cancels the run instead of leaving it pending.
pub async fn cmd_run(service: &EvaluationService, args: RunArgs) -> anyhow::Result<i32> {
    let mut body = serde_json::json!({
        "instruction": args.instruction,
        "rubric_type": args.rubric,
        "model_ids": args.models,
    });
    if let Some(expected) = args.expected {
        body["expected_output"] = expected.into();
    }
    if !args.concepts.is_empty() {
        body["partial_credit_concepts"] = args.concepts.into();
    }
    if let Some(prompt) = args.system_prompt {
        body["system_prompt"] = prompt.into();
    }
    if let Some(t) = args.temperature {
        body["temperature"] = t.into();
    }

    let started = validate_create_evaluation(&body).and_then(|req| service.submit_request(req));
    let (submission, handle) = match started {
        Ok(s) => s,
        Err(e) => return Ok(report_api_error(&e)),
    };
    eprintln!(
        "Running evaluation {} on {} model(s)...",
        submission.evaluation_id,
        submission.models.len()
    );

    tokio::select! {
        joined = handle => {
            joined?;
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted, cancelling {}", submission.evaluation_id);
            service.cancel(&submission.evaluation_id)?;
        }
    }

    let Some(detail) = service.get(&submission.evaluation_id)? else {
        anyhow::bail!("evaluation {} disappeared", submission.evaluation_id);
    };
    tracing::info!(
        event = "cli_run_finished",
        evaluation_id = %submission.evaluation_id,
        status = detail.evaluation.status.as_str(),
    );
    if args.json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_detail(&detail);
    }
    Ok(decide_exit_code(&detail))
}

pub fn cmd_show(service: &EvaluationService, args: ShowArgs) -> anyhow::Result<i32> {
    let Some(detail) = service.get(&args.id)? else {
        eprintln!("evaluation not found: {}", args.id);
        return Ok(exit_codes::CONFIG_ERROR);
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_detail(&detail);
    }
    Ok(exit_codes::OK)
}

fn decide_exit_code(detail: &EvaluationDetail) -> i32 {
    match detail.evaluation.status {
        EvaluationStatus::Failed => exit_codes::TEST_FAILED,
        _ => exit_codes::OK,
    }
}

fn print_detail(detail: &EvaluationDetail) {
    let e = &detail.evaluation;
    eprintln!("\nEvaluation {} [{}]", e.id, e.accuracy_rubric);
    eprintln!("  {}", first_line(&e.instruction_text, 72));

    for r in &detail.results {
        let name = r.model_name.as_deref().unwrap_or("<deleted model>");
        let provider = r.provider.map(|p| p.as_str()).unwrap_or("-");
        let label = format!("{}/{}", provider, name);
        let duration = r
            .result
            .execution_time_ms
            .map(|d| format!("({:.1}s)", d as f64 / 1000.0))
            .unwrap_or_default();

        match r.result.status {
            ResultStatus::Completed => {
                let score = r
                    .result
                    .accuracy_score
                    .map(|s| format!("{:.3}", s))
                    .unwrap_or_else(|| "-".into());
                let tokens = r
                    .result
                    .total_tokens
                    .map(|t| format!("{} tok", t))
                    .unwrap_or_default();
                eprintln!("✅ {:<36} {}  {}  {}", label, score, tokens, duration);
                if let Some(reason) = &r.result.accuracy_reasoning {
                    eprintln!("    {}", reason);
                }
            }
            ResultStatus::Failed => {
                eprintln!("❌ {:<36} {}", label, duration);
                if let Some(msg) = &r.result.error_message {
                    eprintln!("    {}", msg);
                }
            }
            ResultStatus::Pending => eprintln!("⏳ {:<36} pending", label),
        }
    }

    match e.status {
        EvaluationStatus::Failed => eprintln!(
            "\nStatus: failed ({})",
            e.error_message.as_deref().unwrap_or("unknown error")
        ),
        status => eprintln!("\nStatus: {}", status.as_str()),
    }
}

fn first_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}
