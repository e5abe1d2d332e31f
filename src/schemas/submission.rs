use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A finished attempt as handed to the submission sink. Unanswered
/// questions are simply absent from `answers`; the sink accepts partial
/// submissions.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AttemptSubmission {
    pub(crate) attempt_id: Uuid,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) answers: BTreeMap<String, String>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) submitted_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmissionReceipt {
    pub(crate) id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PriorSubmissionStatus {
    pub(crate) already_submitted: bool,
}
