mod file;

pub(crate) use file::FileStore;

use thiserror::Error;

/// Durable per-browser-equivalent key/value storage backing one attempt.
///
/// The contract is read-if-present-else-initialize, write-on-every-mutation,
/// delete-on-terminal-transition. A missing key reads as `Ok(None)`; deletes
/// of missing keys succeed.
pub(crate) trait AttemptStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("attempt state io: {0}")]
    Io(#[from] std::io::Error),
    #[error("attempt state encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub(crate) fn start_time_key(quiz_id: &str, student_id: &str) -> String {
    format!("quiz_{quiz_id}_student_{student_id}_start_time")
}

pub(crate) fn answers_key(quiz_id: &str, student_id: &str) -> String {
    format!("quiz_{quiz_id}_student_{student_id}_answers")
}

pub(crate) fn completed_key(quiz_id: &str) -> String {
    format!("completed_quiz_{quiz_id}")
}

pub(crate) const COMPLETED_MARKER: &str = "true";
