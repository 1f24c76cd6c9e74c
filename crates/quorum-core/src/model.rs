use serde::{Deserialize, Serialize};

/// Temperature recorded for a run when the submitter did not pick one.
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

pub const MAX_SYSTEM_PROMPT_CHARS: usize = 4000;
pub const MAX_INSTRUCTION_CHARS: usize = 10_000;
pub const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Openai,
    Anthropic,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Openai, Provider::Anthropic, Provider::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "openai" => Some(Provider::Openai),
            "anthropic" => Some(Provider::Anthropic),
            "google" => Some(Provider::Google),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricKind {
    ExactMatch,
    PartialCredit,
    SemanticSimilarity,
}

impl RubricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RubricKind::ExactMatch => "exact_match",
            RubricKind::PartialCredit => "partial_credit",
            RubricKind::SemanticSimilarity => "semantic_similarity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact_match" => Some(RubricKind::ExactMatch),
            "partial_credit" => Some(RubricKind::PartialCredit),
            "semantic_similarity" => Some(RubricKind::SemanticSimilarity),
            _ => None,
        }
    }
}

impl std::fmt::Display for RubricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::Pending => "pending",
            EvaluationStatus::Running => "running",
            EvaluationStatus::Completed => "completed",
            EvaluationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => EvaluationStatus::Running,
            "completed" => EvaluationStatus::Completed,
            "failed" => EvaluationStatus::Failed,
            _ => EvaluationStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EvaluationStatus::Completed | EvaluationStatus::Failed)
    }

    /// pending -> running -> {completed, failed}; pending may also fail directly
    /// when a run is cancelled or times out before it is marked running.
    pub fn can_transition_to(&self, next: EvaluationStatus) -> bool {
        match (self, next) {
            (EvaluationStatus::Pending, EvaluationStatus::Running) => true,
            (EvaluationStatus::Pending, EvaluationStatus::Failed) => true,
            (EvaluationStatus::Running, EvaluationStatus::Completed) => true,
            (EvaluationStatus::Running, EvaluationStatus::Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    Completed,
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Pending => "pending",
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => ResultStatus::Completed,
            "failed" => ResultStatus::Failed,
            _ => ResultStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfiguration {
    pub id: String,
    pub provider: Provider,
    pub model_name: String,
    #[serde(skip_serializing)]
    pub api_key_encrypted: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct ModelPatch {
    pub is_active: Option<bool>,
    pub notes: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: String,
    pub instruction_text: String,
    pub accuracy_rubric: RubricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_credit_concepts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub status: EvaluationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvaluation {
    pub instruction_text: String,
    pub accuracy_rubric: RubricKind,
    pub expected_output: Option<String>,
    pub partial_credit_concepts: Option<Vec<String>>,
    pub template_id: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
}

/// One (evaluation x model) outcome row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: String,
    pub evaluation_id: String,
    pub model_id: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_used: Option<f64>,
    pub created_at: String,
}

/// A result row joined with the model it ran against. The model may have
/// been deleted since.
#[derive(Debug, Clone, Serialize)]
pub struct ResultWithModel {
    #[serde(flatten)]
    pub result: ResultRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

/// Terminal write for a result row. Only pending rows accept one.
#[derive(Debug, Clone)]
pub enum ResultUpdate {
    Completed {
        response: ModelResponse,
        score: AccuracyScore,
        system_prompt_used: Option<String>,
        temperature_used: f64,
    },
    Failed {
        error_message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub response_text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyScore {
    pub score: f64,
    pub reasoning: String,
}

/// Fully resolved description of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    pub evaluation_id: String,
    pub model_ids: Vec<String>,
    pub instruction: String,
    pub rubric: RubricKind,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub partial_credit_concepts: Option<Vec<String>>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl EvaluationJob {
    /// Audit value written to every completed result. Recorded even for
    /// backends that ignore temperature.
    pub fn temperature_used(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub instruction_text: String,
    pub model_ids: Vec<String>,
    pub accuracy_rubric: RubricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_credit_concepts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// `None` leaves the backend default in place on every run.
    #[serde(default)]
    pub temperature: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
    pub run_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub instruction_text: String,
    pub model_ids: Vec<String>,
    pub accuracy_rubric: RubricKind,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub partial_credit_concepts: Option<Vec<String>>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EvaluationFilter {
    #[serde(default, alias = "template")]
    pub template_id: Option<String>,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default)]
    pub rubric: Option<RubricKind>,
    #[serde(default)]
    pub min_score: Option<f64>,
}

/// History listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub result_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
}
