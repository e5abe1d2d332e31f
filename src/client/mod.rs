mod http;

pub(crate) use http::SomaApiClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::schemas::identity::{RegistrationRequest, StudentIdentity};
use crate::schemas::quiz::{Question, QuizMeta};
use crate::schemas::submission::{AttemptSubmission, SubmissionReceipt};

/// Read-only access to a quiz and its ordered question list.
#[async_trait]
pub(crate) trait QuestionSource: Send + Sync {
    async fn fetch_quiz(&self, quiz_id: &str) -> Result<QuizMeta, QuestionSourceError>;

    async fn fetch_questions(
        &self,
        quiz_id: &str,
        pin: Option<&str>,
    ) -> Result<Vec<Question>, QuestionSourceError>;
}

/// Registers a student's identifying information and returns a durable id.
#[async_trait]
pub(crate) trait IdentityRegistrar: Send + Sync {
    async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<StudentIdentity, RegistrarError>;
}

/// Remote "has this student already submitted?" pre-check.
#[async_trait]
pub(crate) trait PriorSubmissionChecker: Send + Sync {
    async fn has_submitted(&self, quiz_id: &str, student: &str) -> Result<bool, CheckerError>;
}

/// Accepts a finished attempt. The sink is the enforcement point for
/// duplicate prevention; this client never retries on its own.
#[async_trait]
pub(crate) trait SubmissionSink: Send + Sync {
    async fn submit(&self, attempt: &AttemptSubmission)
        -> Result<SubmissionReceipt, SinkError>;
}

#[derive(Debug, Error)]
pub(crate) enum QuestionSourceError {
    #[error("quiz not found")]
    NotFound,
    #[error("quiz access denied")]
    Unauthorized,
    #[error("malformed quiz payload: {0}")]
    Malformed(String),
    #[error("question source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub(crate) enum RegistrarError {
    #[error("registration rejected: {0}")]
    Rejected(String),
    #[error("identity registrar unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub(crate) enum CheckerError {
    #[error("prior-submission check unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub(crate) enum SinkError {
    #[error("attempt already submitted")]
    Duplicate,
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("submission sink unavailable: {0}")]
    Unavailable(String),
}
