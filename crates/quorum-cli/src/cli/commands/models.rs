use super::{exit_codes, report_api_error};
use crate::cli::args::ModelsSub;
use quorum_core::engine::EvaluationService;
use quorum_core::model::{ModelPatch, Provider};
use quorum_core::storage::ModelDeletion;
use quorum_core::validate::validate_create_model;

pub async fn cmd_models(service: &EvaluationService, cmd: ModelsSub) -> anyhow::Result<i32> {
    let ctx = service.context();
    let store = &ctx.store;

    match cmd {
        ModelsSub::Add {
            provider,
            model_name,
            api_key,
            notes,
            no_check,
        } => {
            let body = serde_json::json!({
                "provider": provider,
                "model_name": model_name,
                "api_key": api_key,
                "notes": notes,
            });
            let new = match validate_create_model(&body) {
                Ok(n) => n,
                Err(e) => return Ok(report_api_error(&e)),
            };
            let model =
                store.insert_model(new.provider, &new.model_name, &new.api_key, new.notes.as_deref())?;
            println!("{}", model.id);

            if !no_check {
                let ok = ctx
                    .factory
                    .test_connection(model.provider.as_str(), &new.api_key, &model.model_name)
                    .await
                    .unwrap_or(false);
                if ok {
                    eprintln!("✅ {} {} reachable", model.provider, model.model_name);
                } else {
                    eprintln!(
                        "⚠️  {} {} saved, but the connection check failed",
                        model.provider, model.model_name
                    );
                }
            }
            Ok(exit_codes::OK)
        }
        ModelsSub::List {
            active,
            provider,
            json,
        } => {
            let provider = match provider.as_deref() {
                None => None,
                Some(tag) => match Provider::parse(tag) {
                    Some(p) => Some(p),
                    None => {
                        eprintln!("config error: unknown provider: {}", tag);
                        return Ok(exit_codes::CONFIG_ERROR);
                    }
                },
            };
            let models = store.list_models(active, provider)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&models)?);
                return Ok(exit_codes::OK);
            }
            for m in &models {
                println!(
                    "{}  {:<9} {:<28} {}",
                    m.id,
                    m.provider.as_str(),
                    m.model_name,
                    if m.is_active { "active" } else { "inactive" }
                );
            }
            if models.is_empty() {
                eprintln!("no models registered");
            }
            Ok(exit_codes::OK)
        }
        ModelsSub::Test { id } => {
            let Some(model) = store.get_model(&id)? else {
                eprintln!("model not found: {}", id);
                return Ok(exit_codes::CONFIG_ERROR);
            };
            let api_key = store.decrypt_api_key(&model.api_key_encrypted)?;
            let ok = ctx
                .factory
                .test_connection(model.provider.as_str(), &api_key, &model.model_name)
                .await?;
            if ok {
                println!("ok");
                Ok(exit_codes::OK)
            } else {
                println!("failed");
                Ok(exit_codes::TEST_FAILED)
            }
        }
        ModelsSub::Enable { id } => set_active(service, &id, true),
        ModelsSub::Disable { id } => set_active(service, &id, false),
        ModelsSub::Remove { id } => match store.delete_model(&id)? {
            ModelDeletion::Deleted => {
                eprintln!("removed {}", id);
                Ok(exit_codes::OK)
            }
            ModelDeletion::NotFound => {
                eprintln!("model not found: {}", id);
                Ok(exit_codes::CONFIG_ERROR)
            }
            ModelDeletion::InUse(n) => {
                eprintln!(
                    "model {} is still used by {} result(s) of unfinished evaluations",
                    id, n
                );
                Ok(exit_codes::CONFIG_ERROR)
            }
        },
    }
}

fn set_active(service: &EvaluationService, id: &str, active: bool) -> anyhow::Result<i32> {
    let patch = ModelPatch {
        is_active: Some(active),
        ..ModelPatch::default()
    };
    match service.context().store.update_model(id, &patch)? {
        Some(m) => {
            eprintln!(
                "{} {}",
                m.model_name,
                if active { "enabled" } else { "disabled" }
            );
            Ok(exit_codes::OK)
        }
        None => {
            eprintln!("model not found: {}", id);
            Ok(exit_codes::CONFIG_ERROR)
        }
    }
}
