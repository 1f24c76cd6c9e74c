use crate::crypto::CredentialCipher;
use crate::model::{
    EvaluationFilter, Evaluation, EvaluationStatus, EvaluationSummary, EvaluationTemplate,
    ModelConfiguration, ModelPatch, NewEvaluation, NewTemplate, Provider, ResultRow,
    ResultStatus, ResultUpdate, ResultWithModel, RubricKind, DEFAULT_TEMPERATURE,
};
use anyhow::Context;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
    cipher: CredentialCipher,
}

/// Outcome of [`Store::delete_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelDeletion {
    Deleted,
    NotFound,
    /// Still referenced by results of unfinished evaluations.
    InUse(u64),
}

const MODEL_COLS: &str =
    "id, provider, model_name, api_key_encrypted, is_active, notes, created_at, updated_at";

const EVAL_COLS: &str = "e.id, e.instruction_text, e.accuracy_rubric, e.expected_output, \
     e.partial_credit_concepts_json, e.system_prompt, e.temperature, e.status, \
     e.error_message, e.created_at, e.completed_at, e.template_id";

const RESULT_COLS: &str = "r.id, r.evaluation_id, r.model_id, r.status, r.response_text, \
     r.execution_time_ms, r.input_tokens, r.output_tokens, r.total_tokens, \
     r.accuracy_score, r.accuracy_reasoning, r.error_message, r.system_prompt_used, \
     r.temperature_used, r.created_at";

const TEMPLATE_COLS: &str = "id, name, description, instruction_text, model_ids_json, \
     accuracy_rubric, expected_output, partial_credit_concepts_json, system_prompt, \
     temperature, run_count, created_at, updated_at";

impl Store {
    pub fn open(path: &Path, cipher: CredentialCipher) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cipher,
        })
    }

    /// In-memory database with a throwaway credential key.
    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cipher: CredentialCipher::random(),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection mutex poisoned"))
    }

    // ---- credentials ----

    pub fn decrypt_api_key(&self, stored: &str) -> anyhow::Result<String> {
        self.cipher
            .decrypt(stored)
            .context("failed to decrypt API key")
    }

    // ---- model configurations ----

    pub fn insert_model(
        &self,
        provider: Provider,
        model_name: &str,
        api_key: &str,
        notes: Option<&str>,
    ) -> anyhow::Result<ModelConfiguration> {
        let api_key_encrypted = self
            .cipher
            .encrypt(api_key)
            .context("failed to encrypt API key")?;
        let now = now_rfc3339();
        let m = ModelConfiguration {
            id: uuid::Uuid::new_v4().to_string(),
            provider,
            model_name: model_name.to_string(),
            api_key_encrypted,
            is_active: true,
            notes: notes.map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO model_configurations
               (id, provider, model_name, api_key_encrypted, is_active, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7)",
            params![
                m.id,
                m.provider.as_str(),
                m.model_name,
                m.api_key_encrypted,
                m.notes,
                m.created_at,
                m.updated_at
            ],
        )?;
        Ok(m)
    }

    pub fn get_model(&self, id: &str) -> anyhow::Result<Option<ModelConfiguration>> {
        let conn = self.lock()?;
        let m = conn
            .query_row(
                &format!("SELECT {} FROM model_configurations WHERE id = ?1", MODEL_COLS),
                [id],
                row_to_model,
            )
            .optional()?;
        Ok(m)
    }

    pub fn list_models(
        &self,
        active_only: bool,
        provider: Option<Provider>,
    ) -> anyhow::Result<Vec<ModelConfiguration>> {
        let mut sql = format!("SELECT {} FROM model_configurations WHERE 1 = 1", MODEL_COLS);
        let mut args: Vec<Value> = Vec::new();
        if active_only {
            sql.push_str(" AND is_active = 1");
        }
        if let Some(p) = provider {
            sql.push_str(" AND provider = ?");
            args.push(Value::Text(p.as_str().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), row_to_model)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Returns `None` when the model does not exist.
    pub fn update_model(
        &self,
        id: &str,
        patch: &ModelPatch,
    ) -> anyhow::Result<Option<ModelConfiguration>> {
        let mut sets = vec!["updated_at = ?"];
        let mut args = vec![Value::Text(now_rfc3339())];
        if let Some(active) = patch.is_active {
            sets.push("is_active = ?");
            args.push(Value::Integer(active as i64));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            args.push(Value::Text(notes.clone()));
        }
        if let Some(key) = &patch.api_key {
            let encrypted = self
                .cipher
                .encrypt(key)
                .context("failed to encrypt API key")?;
            sets.push("api_key_encrypted = ?");
            args.push(Value::Text(encrypted));
        }
        args.push(Value::Text(id.to_string()));

        let changed = {
            let conn = self.lock()?;
            conn.execute(
                &format!(
                    "UPDATE model_configurations SET {} WHERE id = ?",
                    sets.join(", ")
                ),
                params_from_iter(args.iter()),
            )?
        };
        if changed == 0 {
            return Ok(None);
        }
        self.get_model(id)
    }

    pub fn delete_model(&self, id: &str) -> anyhow::Result<ModelDeletion> {
        let conn = self.lock()?;
        let in_use: i64 = conn.query_row(
            "SELECT COUNT(*) FROM results r
             JOIN evaluations e ON e.id = r.evaluation_id
             WHERE r.model_id = ?1 AND e.status IN ('pending', 'running')",
            [id],
            |r| r.get(0),
        )?;
        if in_use > 0 {
            return Ok(ModelDeletion::InUse(in_use as u64));
        }
        let n = conn.execute("DELETE FROM model_configurations WHERE id = ?1", [id])?;
        Ok(if n == 0 {
            ModelDeletion::NotFound
        } else {
            ModelDeletion::Deleted
        })
    }

    /// Number of result rows ever recorded against the model.
    pub fn model_usage_count(&self, id: &str) -> anyhow::Result<u64> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM results WHERE model_id = ?1",
            [id],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    // ---- evaluations ----

    pub fn insert_evaluation(&self, new: &NewEvaluation) -> anyhow::Result<Evaluation> {
        let e = Evaluation {
            id: uuid::Uuid::new_v4().to_string(),
            instruction_text: new.instruction_text.clone(),
            accuracy_rubric: new.accuracy_rubric,
            expected_output: new.expected_output.clone(),
            partial_credit_concepts: new.partial_credit_concepts.clone(),
            system_prompt: new.system_prompt.clone(),
            temperature: new.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            status: EvaluationStatus::Pending,
            error_message: None,
            created_at: now_rfc3339(),
            completed_at: None,
            template_id: new.template_id.clone(),
        };
        let concepts_json = e
            .partial_credit_concepts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO evaluations
               (id, instruction_text, accuracy_rubric, expected_output, partial_credit_concepts_json,
                system_prompt, temperature, status, created_at, template_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9)",
            params![
                e.id,
                e.instruction_text,
                e.accuracy_rubric.as_str(),
                e.expected_output,
                concepts_json,
                e.system_prompt,
                e.temperature,
                e.created_at,
                e.template_id
            ],
        )
        .context("failed to insert evaluation")?;
        Ok(e)
    }

    pub fn get_evaluation(&self, id: &str) -> anyhow::Result<Option<Evaluation>> {
        let conn = self.lock()?;
        let e = conn
            .query_row(
                &format!("SELECT {} FROM evaluations e WHERE e.id = ?1", EVAL_COLS),
                [id],
                row_to_evaluation,
            )
            .optional()?;
        Ok(e)
    }

    /// Applies the transition only if the current status allows it. Returns
    /// whether a row changed; terminal evaluations are never rewritten.
    pub fn update_evaluation_status(
        &self,
        id: &str,
        next: EvaluationStatus,
        message: Option<&str>,
    ) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let current: Option<String> = conn
            .query_row("SELECT status FROM evaluations WHERE id = ?1", [id], |r| {
                r.get(0)
            })
            .optional()?;
        let Some(current) = current.map(|s| EvaluationStatus::parse(&s)) else {
            return Ok(false);
        };
        if !current.can_transition_to(next) {
            return Ok(false);
        }

        let completed_at = next.is_terminal().then(now_rfc3339);
        let n = conn.execute(
            "UPDATE evaluations
             SET status = ?1, error_message = ?2, completed_at = COALESCE(?3, completed_at)
             WHERE id = ?4 AND status = ?5",
            params![next.as_str(), message, completed_at, id, current.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn list_evaluations(
        &self,
        filter: &EvaluationFilter,
        limit: u32,
        offset: u32,
    ) -> anyhow::Result<Vec<EvaluationSummary>> {
        let (where_sql, mut args) = filter_clause(filter);
        args.push(Value::Integer(limit as i64));
        args.push(Value::Integer(offset as i64));
        let sql = format!(
            "SELECT {}, COUNT(r.id), AVG(r.accuracy_score)
             FROM evaluations e
             LEFT JOIN results r ON r.evaluation_id = e.id
             {}
             GROUP BY e.id
             ORDER BY e.created_at DESC, e.rowid DESC
             LIMIT ? OFFSET ?",
            EVAL_COLS, where_sql
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(EvaluationSummary {
                    evaluation: row_to_evaluation(row)?,
                    result_count: row.get::<_, i64>(12)? as u64,
                    average_score: row.get(13)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count_evaluations(&self, filter: &EvaluationFilter) -> anyhow::Result<u64> {
        let (where_sql, args) = filter_clause(filter);
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM evaluations e {}", where_sql),
            params_from_iter(args.iter()),
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    /// Deletes the evaluations and, by cascade, their results.
    pub fn delete_evaluations(&self, ids: &[String]) -> anyhow::Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.lock()?;
        let n = conn.execute(
            &format!("DELETE FROM evaluations WHERE id IN ({})", placeholders),
            params_from_iter(ids.iter()),
        )?;
        Ok(n)
    }

    // ---- results ----

    pub fn insert_result(&self, evaluation_id: &str, model_id: &str) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO results (id, evaluation_id, model_id, status, created_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![id, evaluation_id, model_id, now_rfc3339()],
        )
        .context("failed to insert result")?;
        Ok(id)
    }

    /// Writes a terminal outcome. Rows that already left `pending` are left
    /// untouched and `false` is returned.
    pub fn update_result(&self, id: &str, update: &ResultUpdate) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let n = match update {
            ResultUpdate::Completed {
                response,
                score,
                system_prompt_used,
                temperature_used,
            } => conn.execute(
                "UPDATE results SET
                   status = 'completed', response_text = ?2, execution_time_ms = ?3,
                   input_tokens = ?4, output_tokens = ?5, total_tokens = ?6,
                   accuracy_score = ?7, accuracy_reasoning = ?8,
                   system_prompt_used = ?9, temperature_used = ?10, error_message = NULL
                 WHERE id = ?1 AND status = 'pending'",
                params![
                    id,
                    response.response_text,
                    response.execution_time_ms as i64,
                    response.input_tokens as i64,
                    response.output_tokens as i64,
                    response.total_tokens as i64,
                    score.score,
                    score.reasoning,
                    system_prompt_used,
                    temperature_used
                ],
            )?,
            ResultUpdate::Failed { error_message } => conn.execute(
                "UPDATE results SET status = 'failed', error_message = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id, error_message],
            )?,
        };
        Ok(n > 0)
    }

    /// Forces every still-pending result of the evaluation to `failed`.
    pub fn fail_pending_results(&self, evaluation_id: &str, message: &str) -> anyhow::Result<usize> {
        let conn = self.lock()?;
        let n = conn.execute(
            "UPDATE results SET status = 'failed', error_message = ?2
             WHERE evaluation_id = ?1 AND status = 'pending'",
            params![evaluation_id, message],
        )?;
        Ok(n)
    }

    pub fn get_results(&self, evaluation_id: &str) -> anyhow::Result<Vec<ResultRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM results r WHERE r.evaluation_id = ?1 ORDER BY r.created_at, r.rowid",
            RESULT_COLS
        ))?;
        let rows = stmt
            .query_map([evaluation_id], row_to_result)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_results_with_models(
        &self,
        evaluation_id: &str,
    ) -> anyhow::Result<Vec<ResultWithModel>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, m.model_name, m.provider
             FROM results r
             LEFT JOIN model_configurations m ON m.id = r.model_id
             WHERE r.evaluation_id = ?1
             ORDER BY r.created_at, r.rowid",
            RESULT_COLS
        ))?;
        let rows = stmt
            .query_map([evaluation_id], |row| {
                let provider: Option<String> = row.get(16)?;
                Ok(ResultWithModel {
                    result: row_to_result(row)?,
                    model_name: row.get(15)?,
                    provider: provider.as_deref().and_then(Provider::parse),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ---- templates ----

    pub fn insert_template(&self, new: &NewTemplate) -> anyhow::Result<EvaluationTemplate> {
        let now = now_rfc3339();
        let t = EvaluationTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name.clone(),
            description: new.description.clone(),
            instruction_text: new.instruction_text.clone(),
            model_ids: new.model_ids.clone(),
            accuracy_rubric: new.accuracy_rubric,
            expected_output: new.expected_output.clone(),
            partial_credit_concepts: new.partial_credit_concepts.clone(),
            system_prompt: new.system_prompt.clone(),
            temperature: new.temperature,
            created_at: now.clone(),
            updated_at: now,
            run_count: 0,
        };
        let model_ids_json = serde_json::to_string(&t.model_ids)?;
        let concepts_json = t
            .partial_credit_concepts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO evaluation_templates
               (id, name, description, instruction_text, model_ids_json, accuracy_rubric,
                expected_output, partial_credit_concepts_json, system_prompt, temperature,
                run_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12)",
            params![
                t.id,
                t.name,
                t.description,
                t.instruction_text,
                model_ids_json,
                t.accuracy_rubric.as_str(),
                t.expected_output,
                concepts_json,
                t.system_prompt,
                t.temperature,
                t.created_at,
                t.updated_at
            ],
        )
        .context("failed to insert template")?;
        Ok(t)
    }

    pub fn get_template(&self, id: &str) -> anyhow::Result<Option<EvaluationTemplate>> {
        let conn = self.lock()?;
        let t = conn
            .query_row(
                &format!("SELECT {} FROM evaluation_templates WHERE id = ?1", TEMPLATE_COLS),
                [id],
                row_to_template,
            )
            .optional()?;
        Ok(t)
    }

    pub fn list_templates(&self) -> anyhow::Result<Vec<EvaluationTemplate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM evaluation_templates ORDER BY created_at DESC, rowid DESC",
            TEMPLATE_COLS
        ))?;
        let rows = stmt
            .query_map([], row_to_template)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Evaluations created from the template keep their rows; the reference is cleared.
    pub fn delete_template(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM evaluation_templates WHERE id = ?1", [id])?;
        Ok(n > 0)
    }

    pub fn increment_template_runs(&self, id: &str) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE evaluation_templates SET run_count = run_count + 1, updated_at = ?2 WHERE id = ?1",
            params![id, now_rfc3339()],
        )?;
        Ok(())
    }
}

fn filter_clause(filter: &EvaluationFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut args = Vec::new();
    if let Some(t) = &filter.template_id {
        clauses.push("e.template_id = ?");
        args.push(Value::Text(t.clone()));
    }
    if let Some(from) = &filter.from_date {
        clauses.push("e.created_at >= ?");
        args.push(Value::Text(from.clone()));
    }
    if let Some(to) = &filter.to_date {
        clauses.push("e.created_at <= ?");
        args.push(Value::Text(inclusive_end(to)));
    }
    if let Some(rubric) = filter.rubric {
        clauses.push("e.accuracy_rubric = ?");
        args.push(Value::Text(rubric.as_str().to_string()));
    }
    if let Some(min) = filter.min_score {
        clauses.push(
            "EXISTS (SELECT 1 FROM results rs WHERE rs.evaluation_id = e.id AND rs.accuracy_score >= ?)",
        );
        args.push(Value::Real(min));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (where_sql, args)
}

/// A bare `YYYY-MM-DD` upper bound covers the whole day.
fn inclusive_end(to: &str) -> String {
    if to.len() == 10 {
        format!("{}T23:59:59.999Z", to)
    } else {
        to.to_string()
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn tag<T>(idx: usize, raw: &str, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown tag: {}", raw).into())
    })
}

fn json_col<T: DeserializeOwned>(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<T>> {
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(|v| v.max(0) as u64))
}

fn row_to_model(row: &Row<'_>) -> rusqlite::Result<ModelConfiguration> {
    let provider: String = row.get(1)?;
    Ok(ModelConfiguration {
        id: row.get(0)?,
        provider: tag(1, &provider, Provider::parse)?,
        model_name: row.get(2)?,
        api_key_encrypted: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_evaluation(row: &Row<'_>) -> rusqlite::Result<Evaluation> {
    let rubric: String = row.get(2)?;
    let status: String = row.get(7)?;
    Ok(Evaluation {
        id: row.get(0)?,
        instruction_text: row.get(1)?,
        accuracy_rubric: tag(2, &rubric, RubricKind::parse)?,
        expected_output: row.get(3)?,
        partial_credit_concepts: json_col(4, row.get(4)?)?,
        system_prompt: row.get(5)?,
        temperature: row.get(6)?,
        status: EvaluationStatus::parse(&status),
        error_message: row.get(8)?,
        created_at: row.get(9)?,
        completed_at: row.get(10)?,
        template_id: row.get(11)?,
    })
}

fn row_to_result(row: &Row<'_>) -> rusqlite::Result<ResultRow> {
    let status: String = row.get(3)?;
    Ok(ResultRow {
        id: row.get(0)?,
        evaluation_id: row.get(1)?,
        model_id: row.get(2)?,
        status: ResultStatus::parse(&status),
        response_text: row.get(4)?,
        execution_time_ms: opt_count(row, 5)?,
        input_tokens: opt_count(row, 6)?,
        output_tokens: opt_count(row, 7)?,
        total_tokens: opt_count(row, 8)?,
        accuracy_score: row.get(9)?,
        accuracy_reasoning: row.get(10)?,
        error_message: row.get(11)?,
        system_prompt_used: row.get(12)?,
        temperature_used: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn row_to_template(row: &Row<'_>) -> rusqlite::Result<EvaluationTemplate> {
    let rubric: String = row.get(5)?;
    Ok(EvaluationTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        instruction_text: row.get(3)?,
        model_ids: json_col(4, row.get(4)?)?.unwrap_or_default(),
        accuracy_rubric: tag(5, &rubric, RubricKind::parse)?,
        expected_output: row.get(6)?,
        partial_credit_concepts: json_col(7, row.get(7)?)?,
        system_prompt: row.get(8)?,
        temperature: row.get(9)?,
        run_count: row.get::<_, i64>(10)?.max(0) as u64,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
