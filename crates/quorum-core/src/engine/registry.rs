use super::executor::EvaluationExecutor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Live executors by evaluation id. An entry exists only while its run does.
#[derive(Default)]
pub struct ExecutorRegistry {
    entries: Mutex<HashMap<String, Arc<EvaluationExecutor>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<EvaluationExecutor>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces any previous entry for the id.
    pub fn register(&self, evaluation_id: impl Into<String>, executor: Arc<EvaluationExecutor>) {
        self.entries().insert(evaluation_id.into(), executor);
    }

    pub fn lookup(&self, evaluation_id: &str) -> Option<Arc<EvaluationExecutor>> {
        self.entries().get(evaluation_id).cloned()
    }

    pub fn unregister(&self, evaluation_id: &str) -> Option<Arc<EvaluationExecutor>> {
        self.entries().remove(evaluation_id)
    }

    /// Removes the entry only if it still points at `executor`.
    pub fn unregister_if_same(&self, evaluation_id: &str, executor: &Arc<EvaluationExecutor>) -> bool {
        let mut entries = self.entries();
        match entries.get(evaluation_id) {
            Some(current) if Arc::ptr_eq(current, executor) => {
                entries.remove(evaluation_id);
                true
            }
            _ => false,
        }
    }

    /// Removes the entry and aborts its run. `Ok(false)` when nothing was running.
    pub fn cancel(&self, evaluation_id: &str) -> anyhow::Result<bool> {
        let Some(executor) = self.unregister(evaluation_id) else {
            return Ok(false);
        };
        executor.abort()?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }
}
