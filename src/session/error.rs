use thiserror::Error;

use super::Phase;
use crate::store::StoreError;

/// Everything here resolves to a displayed message and a safe state; no
/// variant is fatal to the process.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("the quiz window has closed")]
    ClosedWindow,
    #[error("this quiz has already been submitted")]
    AlreadySubmitted,
    #[error("registration failed: {0}")]
    RegistrationFailed(String),
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
    #[error("failed to load quiz questions: {0}")]
    LoadFailed(String),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("{operation} is not valid in the {} phase", .phase.as_str())]
    InvalidPhase { operation: &'static str, phase: Phase },
    #[error(transparent)]
    Storage(#[from] StoreError),
}
