pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS model_configurations (
  id TEXT PRIMARY KEY,
  provider TEXT NOT NULL CHECK (provider IN ('openai', 'anthropic', 'google')),
  model_name TEXT NOT NULL,
  api_key_encrypted TEXT NOT NULL,
  is_active INTEGER NOT NULL DEFAULT 1,
  notes TEXT,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluation_templates (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT,
  instruction_text TEXT NOT NULL,
  model_ids_json TEXT NOT NULL,
  accuracy_rubric TEXT NOT NULL
    CHECK (accuracy_rubric IN ('exact_match', 'partial_credit', 'semantic_similarity')),
  expected_output TEXT,
  partial_credit_concepts_json TEXT,
  system_prompt TEXT,
  temperature REAL CHECK (temperature IS NULL OR (temperature >= 0.0 AND temperature <= 2.0)),
  run_count INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluations (
  id TEXT PRIMARY KEY,
  instruction_text TEXT NOT NULL,
  accuracy_rubric TEXT NOT NULL
    CHECK (accuracy_rubric IN ('exact_match', 'partial_credit', 'semantic_similarity')),
  expected_output TEXT,
  partial_credit_concepts_json TEXT,
  system_prompt TEXT,
  temperature REAL NOT NULL DEFAULT 0.3 CHECK (temperature >= 0.0 AND temperature <= 2.0),
  status TEXT NOT NULL DEFAULT 'pending'
    CHECK (status IN ('pending', 'running', 'completed', 'failed')),
  error_message TEXT,
  created_at TEXT NOT NULL,
  completed_at TEXT,
  template_id TEXT REFERENCES evaluation_templates(id) ON DELETE SET NULL
);

-- model_id carries no foreign key: results outlive deleted models.
CREATE TABLE IF NOT EXISTS results (
  id TEXT PRIMARY KEY,
  evaluation_id TEXT NOT NULL REFERENCES evaluations(id) ON DELETE CASCADE,
  model_id TEXT NOT NULL,
  status TEXT NOT NULL DEFAULT 'pending'
    CHECK (status IN ('pending', 'completed', 'failed')),
  response_text TEXT,
  execution_time_ms INTEGER,
  input_tokens INTEGER,
  output_tokens INTEGER,
  total_tokens INTEGER,
  accuracy_score REAL,
  accuracy_reasoning TEXT,
  error_message TEXT,
  system_prompt_used TEXT,
  temperature_used REAL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_evaluation ON results(evaluation_id);
CREATE INDEX IF NOT EXISTS idx_results_model ON results(model_id);
CREATE INDEX IF NOT EXISTS idx_evaluations_created ON evaluations(created_at);
CREATE INDEX IF NOT EXISTS idx_evaluations_template ON evaluations(template_id);
"#;
