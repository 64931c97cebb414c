use crate::engine::error::EngineError;

/// Outcome of a best-effort sweep. Failed items are reported instead of being
/// silently swallowed so callers and tests can assert on partial failure.
#[derive(Debug, Default)]
pub struct BatchResult<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(T, EngineError)>
}

impl<T> BatchResult<T> {
    pub fn new() -> BatchResult<T> {
        BatchResult {
            succeeded: Vec::new(),
            failed: Vec::new()
        }
    }

    pub fn record(&mut self, item: T, outcome: Result<(), EngineError>) {
        match outcome {
            Ok(()) => self.succeeded.push(item),
            Err(e) => self.failed.push((item, e))
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
