pub mod executor;
pub mod registry;
pub mod service;

pub use executor::{EvaluationExecutor, ExecutorContext, ExecutorState};
pub use registry::ExecutorRegistry;
pub use service::{start_evaluation, EvaluationService, Submission};
